use anyhow::Result;

fn main() -> Result<()> {
    auditmap_cli::main_entry()
}
