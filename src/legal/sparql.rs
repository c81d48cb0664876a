//! Citation graph queries against the Fedlex SPARQL endpoint

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

/// One result row: variable name → value
pub type CitationRecord = BTreeMap<String, String>;

/// Placeholder substituted with a resource URI
const RESOURCE_PLACEHOLDER: &str = "__REPLACER__";

/// Every consolidated act currently in force, with German title and abbreviation
pub const FULL_CATALOG_QUERY: &str = r#"
PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
PREFIX jolux: <http://data.legilux.public.lu/resource/ontology/jolux#>
PREFIX skos: <http://www.w3.org/2004/02/skos/core#>

SELECT DISTINCT ?sr_number ?titel ?abbreviation ?sr_uri WHERE {
    ?sr_uri rdf:type jolux:ConsolidationAbstract .
    ?sr_uri jolux:classifiedByTaxonomyEntry ?TaxonomyEntry ;
            jolux:isRealizedBy ?Expression .

    ?TaxonomyEntry skos:notation ?sr_number .

    ?Expression jolux:language <http://publications.europa.eu/resource/authority/language/DEU> .

    ?Expression jolux:title ?titel ;
                jolux:titleShort ?abbreviation .

    ?sr_uri jolux:dateEntryInForce ?datumInKraft .
    FILTER( ( xsd:date(?datumInKraft) <= xsd:date(now()) ) )
    OPTIONAL { ?sr_uri jolux:dateNoLongerInForce ?datumAufhebung . }
    FILTER( !bound(?datumAufhebung) || xsd:date(?datumAufhebung) >= xsd:date(now()) )
}
"#;

/// Acts in force that the given act cites
pub const CITED_BY_QUERY: &str = r#"
PREFIX jolux: <http://data.legilux.public.lu/resource/ontology/jolux#>
PREFIX skos: <http://www.w3.org/2004/02/skos/core#>
PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>

SELECT DISTINCT ?abbreviation ?id_cited ?title_cited ?article_cited ?uri_citation_loc WHERE {
    ?Consolidation jolux:isMemberOf <__REPLACER__> .
    ?Subdivision jolux:legalResourceSubdivisionIsPartOf ?Consolidation .

    ?uri_citation_loc jolux:citationFromLegalResource ?Subdivision .
    ?uri_citation_loc jolux:language <http://publications.europa.eu/resource/authority/language/DEU> .

    ?uri_citation_loc jolux:citationToLegalResource/jolux:legalResourceSubdivisionIsPartOf ?Zitiertes_Gesetz .
    ?Zitiertes_Gesetz rdf:type jolux:ConsolidationAbstract .

    ?Zitiertes_Gesetz jolux:isRealizedBy ?Expression .
    ?Expression jolux:language <http://publications.europa.eu/resource/authority/language/DEU> .
    ?Expression jolux:title ?title_cited ;
                jolux:titleShort ?abbreviation ;
                jolux:historicalLegalId ?id_cited .

    OPTIONAL { ?uri_citation_loc jolux:descriptionFrom ?article_cited . }

    ?Zitiertes_Gesetz jolux:dateEntryInForce ?datumInKraft .
    FILTER( ( xsd:date(?datumInKraft) <= xsd:date(now()) ) )
    OPTIONAL { ?Zitiertes_Gesetz jolux:dateNoLongerInForce ?datumAufhebung . }
    FILTER( !bound(?datumAufhebung) || xsd:date(?datumAufhebung) >= xsd:date(now()) )
}
"#;

/// Acts in force citing the given act
pub const CITING_QUERY: &str = r#"
PREFIX jolux: <http://data.legilux.public.lu/resource/ontology/jolux#>
PREFIX skos: <http://www.w3.org/2004/02/skos/core#>

SELECT DISTINCT ?abbreviation ?citing_id ?citing_title ?citing_article ?citing_uri WHERE {
    ?Subdivision jolux:legalResourceSubdivisionIsPartOf <__REPLACER__> .

    ?citing_uri jolux:citationToLegalResource ?Subdivision .
    ?citing_uri jolux:language <http://publications.europa.eu/resource/authority/language/DEU> .

    ?citing_uri jolux:citationFromLegalResource/jolux:legalResourceSubdivisionIsPartOf/jolux:isMemberOf ?Zitierendes_Gesetz .

    ?Zitierendes_Gesetz jolux:classifiedByTaxonomyEntry ?TaxonomyEntry ;
                        jolux:isRealizedBy ?Expression .
    ?TaxonomyEntry skos:notation ?citing_id .
    ?Expression jolux:language <http://publications.europa.eu/resource/authority/language/DEU> ;
                jolux:titleShort ?abbreviation ;
                jolux:title ?citing_title .

    OPTIONAL { ?citing_uri jolux:descriptionFrom ?citing_article . }

    ?Zitierendes_Gesetz jolux:dateEntryInForce ?datumInKraft .
    FILTER( ( xsd:date(?datumInKraft) <= xsd:date(now()) ) )
    OPTIONAL { ?Zitierendes_Gesetz jolux:dateNoLongerInForce ?datumAufhebung . }
    FILTER( !bound(?datumAufhebung) || xsd:date(?datumAufhebung) >= xsd:date(now()) )
}
"#;

/// Errors of the legal catalog path
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("SPARQL request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("SPARQL endpoint returned HTTP {status}")]
    Endpoint { status: u16 },

    #[error("Malformed SPARQL response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid resource URI: {0:?}")]
    InvalidUri(String),

    #[error("Catalog record {index} has no `{field}` value")]
    MissingField { index: usize, field: &'static str },

    #[error("Failed to write catalog: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of citation-graph records
#[async_trait]
pub trait CitationSource: Send + Sync {
    /// Every act currently in force
    async fn full_catalog(&self) -> Result<Vec<CitationRecord>, CatalogError>;

    /// Acts citing `resource_uri`
    async fn citing(&self, resource_uri: &str) -> Result<Vec<CitationRecord>, CatalogError>;

    /// Acts cited by `resource_uri`
    async fn cited_by(&self, resource_uri: &str) -> Result<Vec<CitationRecord>, CatalogError>;
}

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    bindings: Vec<BTreeMap<String, SparqlValue>>,
}

#[derive(Debug, Deserialize)]
struct SparqlValue {
    value: String,
}

/// Flattens a `application/sparql-results+json` document into records
///
/// Non-breaking spaces are removed from every value.
pub fn parse_results(body: &str) -> Result<Vec<CitationRecord>, CatalogError> {
    let response: SparqlResponse = serde_json::from_str(body)?;

    Ok(response
        .results
        .bindings
        .into_iter()
        .map(|binding| {
            binding
                .into_iter()
                .map(|(name, value)| (name, value.value.replace('\u{a0}', "")))
                .collect()
        })
        .collect())
}

/// Substitutes a resource URI into a query template
///
/// URIs that could break out of the `<...>` IRI are rejected.
pub fn bind_resource(template: &str, resource_uri: &str) -> Result<String, CatalogError> {
    let malformed = resource_uri.is_empty()
        || resource_uri
            .chars()
            .any(|c| c == '<' || c == '>' || c == '"' || c.is_whitespace());

    if malformed {
        return Err(CatalogError::InvalidUri(resource_uri.to_string()));
    }

    Ok(template.replace(RESOURCE_PLACEHOLDER, resource_uri))
}

/// Citation source backed by a SPARQL endpoint
#[derive(Debug, Clone)]
pub struct SparqlCitationSource {
    client: Client,
    endpoint: Url,
}

impl SparqlCitationSource {
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    /// Runs a SELECT query and returns its rows
    pub async fn select(&self, query: &str) -> Result<Vec<CitationRecord>, CatalogError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(ACCEPT, "application/sparql-results+json")
            .form(&[("query", query)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Endpoint {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let records = parse_results(&body)?;
        tracing::debug!("SPARQL query returned {} rows", records.len());
        Ok(records)
    }
}

#[async_trait]
impl CitationSource for SparqlCitationSource {
    async fn full_catalog(&self) -> Result<Vec<CitationRecord>, CatalogError> {
        self.select(FULL_CATALOG_QUERY).await
    }

    async fn citing(&self, resource_uri: &str) -> Result<Vec<CitationRecord>, CatalogError> {
        self.select(&bind_resource(CITING_QUERY, resource_uri)?).await
    }

    async fn cited_by(&self, resource_uri: &str) -> Result<Vec<CitationRecord>, CatalogError> {
        self.select(&bind_resource(CITED_BY_QUERY, resource_uri)?).await
    }
}
