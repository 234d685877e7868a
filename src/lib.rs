pub mod core;
pub mod crawler;
pub mod llm;
pub mod memory;
pub mod rag;
pub mod server;
pub mod state;
pub mod vector_math;
