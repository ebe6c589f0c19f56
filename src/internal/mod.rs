//! Internal building blocks (object codecs, loose-object store, refs, repository
//! façade, rev-parse, module filter) that back the public API.

pub mod codec;
pub mod modules;
pub mod odb;
pub mod refs;
pub mod repository;
pub mod revparse;
pub mod zlib;
