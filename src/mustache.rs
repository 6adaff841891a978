pub mod cache;
pub mod context;
pub mod error;
pub mod escape;
pub mod parser;
pub mod partials;
pub mod scanner;
pub mod token;
pub mod value;
pub mod writer;

pub use cache::{CacheKey, MemoryCache, TemplateCache};
pub use context::Context;
pub use error::{Error, Result};
pub use escape::escape_html;
pub use partials::{Partials, PartialsDir};
pub use token::{Tags, Token, TokenTree};
pub use value::{Lambda, SubRender, Value};
pub use writer::{EscapeFn, RenderConfig, Writer};
