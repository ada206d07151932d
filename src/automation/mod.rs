pub(crate) mod data;
pub(crate) mod ease;
pub(crate) mod parameter;
pub(crate) mod sequence;
pub(crate) mod standard;
pub(crate) mod value;
