pub(crate) mod clock;
pub(crate) mod headless;
pub(crate) mod observe;
pub(crate) mod scheduler;
