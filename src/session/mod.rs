pub(crate) mod artifacts;
pub(crate) mod display;
pub(crate) mod output;
pub(crate) mod player;
