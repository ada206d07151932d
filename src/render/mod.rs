pub(crate) mod composite;
pub(crate) mod context;
pub(crate) mod frame;
pub(crate) mod manager;
pub(crate) mod proxy;
pub(crate) mod scratch;
pub(crate) mod surface;
