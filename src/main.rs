fn main() -> anyhow::Result<()> {
    genome_qc::run()
}
