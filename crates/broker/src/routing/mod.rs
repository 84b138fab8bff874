pub mod ai_router;
pub mod chain;
pub mod engine;
pub mod mentions;
pub mod rate_limit;
