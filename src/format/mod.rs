//! `%`-directive template formatter (`spec.md` §4.G): a parser producing a
//! small AST, a facade abstraction that hides the concrete object kind from
//! the renderer, relative-date bucketing, and named-color resolution.

pub mod color;
pub mod date;
pub mod parser;
pub mod render;

pub use render::{format, BuildFacade, Facade, FilesFacade, GitView, RenderOptions, ReportFacade};
