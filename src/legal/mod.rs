//! Handling of Swiss federal legal texts
//!
//! Pages of the legal portal are rendered by scripts, so the plain HTTP body
//! only carries a placeholder. Such pages are detected by a marker in their
//! visible text ([`is_gated`]) and escalated: a [`Renderer`] loads the page,
//! the in-force banner is read and the XML document of the active version is
//! resolved. The catalog crawler walks the whole law collection via SPARQL.

mod catalog;
mod escalator;
mod gate;
mod render;
mod resolver;
mod sparql;

pub use catalog::{website_uri, CatalogCrawler, CatalogEntry, CatalogReport};
pub use escalator::{interpret_rendered, EscalationResult, Escalator};
pub use gate::{is_gated, visible_text};
pub use render::{RenderError, RenderedPage, Renderer, UnavailableRenderer};
pub use resolver::{active_version, detect_status, shows_status, ActiveVersion, LegalStatus};
pub use sparql::{
    bind_resource, parse_results, CatalogError, CitationRecord, CitationSource,
    SparqlCitationSource, CITED_BY_QUERY, CITING_QUERY, FULL_CATALOG_QUERY,
};

#[cfg(feature = "browser")]
pub use render::ChromeRenderer;
