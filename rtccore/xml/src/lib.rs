pub mod attrs;
pub mod builder;
pub mod error;
pub mod jid;
pub mod marshal;
pub mod node;

pub use attrs::AttrParser;
pub use builder::NodeBuilder;
pub use error::{Result, XmlError};
pub use jid::Jid;
pub use marshal::{marshal, marshal_to, unmarshal};
pub use node::{Attrs, Node, NodeContent};
