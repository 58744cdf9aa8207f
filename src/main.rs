use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use semtab::block::EthBlock;
use semtab::chain::EvmChain;
use semtab::export;
use semtab::fetch::{BlockFetcher, NodeKind};
use semtab::transform::SemanticTransformer;

#[derive(Debug, Parser)]
#[command(
    name = "semtab",
    version,
    about = "Transform the transactions in a block with a semantic ABI"
)]
struct Args {
    /// Path to the semantic ABI JSON document
    #[arg(long)]
    abi: PathBuf,

    /// Chain the block belongs to (e.g. ethereum, polygon)
    #[arg(long)]
    chain: String,

    /// Read the {block, receipts, traces} document from a file
    #[arg(long)]
    block_file: Option<PathBuf>,

    /// Fetch the block from a JSON-RPC endpoint instead
    #[arg(long)]
    rpc: Option<String>,

    /// Block number to fetch (with --rpc)
    #[arg(long)]
    block: Option<u64>,

    /// Node implementation behind --rpc
    #[arg(long, default_value = "geth")]
    node: String,

    /// Output format: csv or json
    #[arg(long, default_value = "csv")]
    format: String,

    /// Output file; stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let chain = EvmChain::parse(&args.chain)
        .with_context(|| format!("unsupported chain '{}'", args.chain))?;

    // any configuration defect fails here, before touching block data
    let abi_text = fs::read_to_string(&args.abi)
        .with_context(|| format!("failed to read {}", args.abi.display()))?;
    let transformer = SemanticTransformer::from_str(&abi_text)?;

    let block_json = match (&args.block_file, &args.rpc) {
        (Some(path), _) => serde_json::from_str(
            &fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
        )?,
        (None, Some(rpc)) => {
            let number = args
                .block
                .context("--block is required when fetching over --rpc")?;
            let fetcher = BlockFetcher::new(rpc.clone(), NodeKind::parse(&args.node)?);
            tokio::runtime::Runtime::new()?.block_on(fetcher.fetch_block(number))?
        }
        (None, None) => bail!("one of --block-file or --rpc is required"),
    };

    let block = EthBlock::from_json(chain, &block_json)?;
    let rows = transformer.transform(&block);
    log::info!(
        "transformed block {} into {} rows across {} columns",
        block.number,
        rows.len(),
        transformer.schema().len()
    );

    let written = match (args.format.as_str(), &args.output) {
        ("csv", Some(path)) => export::write_csv_file(path, transformer.schema(), &rows),
        ("csv", None) => export::write_csv(std::io::stdout().lock(), transformer.schema(), &rows),
        ("json", Some(path)) => export::write_json_file(path, transformer.schema(), &rows),
        ("json", None) => export::write_json(std::io::stdout().lock(), transformer.schema(), &rows),
        (other, _) => bail!("unknown format '{other}'"),
    }
    .map_err(|e| anyhow::anyhow!("export failed: {e}"))?;

    log::debug!("wrote {written} rows");
    Ok(())
}
