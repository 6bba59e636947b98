fn main() {
    println!("hlama-rs - HLA genotype comparison across samples of a donor");
    println!();
    println!("RECOMMENDED: Use the combined tool for most workflows:");
    println!("  hlama        - Complete run: description table + reads -> per-sample types + report");
    println!();
    println!("Tools for partial workflows:");
    println!("  hla_types    - Normalize one caller result into a sorted allele list");
    println!("  hla_compare  - Rerun the comparison over an existing work directory");
    println!();
    println!("For help with each tool:");
    println!("  cargo run -- --help                        # The combined tool");
    println!("  cargo run --bin hla_types -- --help        # Normalization only");
    println!("  cargo run --bin hla_compare -- --help      # Comparison only");
    println!();
    println!("Quick start example:");
    println!("  cargo run -- --tumor-normal donors.tsv --reads-base-dir fastq --work-dir work");
}
