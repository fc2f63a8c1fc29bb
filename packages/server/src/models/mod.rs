pub mod spotted;
