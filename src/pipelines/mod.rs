pub mod consensus_genome;
