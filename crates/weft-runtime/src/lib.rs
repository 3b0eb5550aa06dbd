//! Runtime for compiled weft templates.
//!
//! Two hosts execute the compiler's artifacts: [`html::HtmlRenderer`]
//! streams a template to text on the server and serializes the resume
//! payload, and [`engine::DomEngine`] instantiates the fine-grained DOM
//! program on the client, either from scratch or by hydrating that
//! payload. The DOM is an in-process arena ([`dom::SimDom`]) so engine
//! behavior is testable without a browser; identity assertions (a loop
//! reordered nodes instead of recreating them) fall out of arena indices.

pub mod dom;
pub mod engine;
pub mod eval;
pub mod harness;
pub mod html;
pub mod resume;
pub mod scope;
pub mod value;

pub use dom::{NodeIx, SimDom};
pub use engine::DomEngine;
pub use harness::Harness;
pub use html::{HtmlRenderer, RenderOutput};
pub use scope::{ScopeId, Scopes};
pub use value::Value;
