//! End-to-end flows: HTTP router → dispatcher → scripted backend.

pub mod flows;
