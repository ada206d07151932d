pub(crate) mod automatable;
pub(crate) mod clip;
pub(crate) mod matrix;
pub(crate) mod notify;
pub(crate) mod span;
#[allow(clippy::module_inception)]
pub(crate) mod timeline;
pub(crate) mod track;
