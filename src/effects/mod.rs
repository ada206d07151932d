pub(crate) mod effect;
pub(crate) mod kind;
pub(crate) mod list;
pub(crate) mod process;
