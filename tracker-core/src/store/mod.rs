//! The RDF store: schema materialisation, resource-id allocation, the
//! transactional update buffer, and the statement interpreter that drives
//! them from a parsed batch.

pub mod blank;
pub mod interpreter;
pub mod resource;
pub mod schema;
pub mod sqlite;
pub mod update_buffer;

pub use interpreter::{BatchReport, Interpreter, Object, Statement};
pub use resource::ResourceAllocator;
pub use sqlite::{OpenReport, Store};
pub use update_buffer::UpdateBuffer;
