pub mod annotate;
pub mod command;
pub mod coverage;
pub mod depth;
pub mod fastx;
pub mod file;
pub mod fragments;
pub mod runlog;
pub mod tables;
pub mod vcf;
pub mod workspace;
