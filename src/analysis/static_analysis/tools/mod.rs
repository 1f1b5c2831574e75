pub mod pmd;

pub use pmd::PmdTool;
