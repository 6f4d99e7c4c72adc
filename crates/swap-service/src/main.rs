//! Main entry point for the swap service.
//!
//! `serve` runs the gateway API. The other commands act as a headless wallet
//! client: they sign in against a running gateway and drive the swap pipeline
//! through its authenticated proxy.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use swap_config::Config;
use swap_core::{format_amount, AllowanceStatus, PriceApplied, SwapEngineBuilder, SwapView};
use swap_types::TransactionStatus;

mod apis;
mod server;

/// Command-line arguments for the swap service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run the API server (default)
	Serve,
	/// List the tokens tradable on the required chain
	Tokens,
	/// Show the configured wallet's address, chain and native balance
	Account,
	/// Price, approve if needed, and execute a swap
	Swap(SwapArgs),
}

#[derive(ClapArgs, Debug)]
struct SwapArgs {
	/// Symbol of the token to sell
	#[arg(long)]
	sell: String,
	/// Symbol of the token to buy
	#[arg(long)]
	buy: String,
	/// Amount to sell, in whole tokens
	#[arg(long, conflicts_with = "buy_amount", required_unless_present = "buy_amount")]
	amount: Option<String>,
	/// Amount to buy, in whole tokens
	#[arg(long)]
	buy_amount: Option<String>,
	/// Stop after pricing and approval
	#[arg(long)]
	dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let path = args
		.config
		.to_str()
		.ok_or("configuration path is not valid UTF-8")?;
	let config = Config::from_file(path).await?;
	tracing::info!(app = %config.app.id, "Loaded configuration");

	match args.command.unwrap_or(Command::Serve) {
		Command::Serve => serve(config).await,
		Command::Tokens => {
			list_tokens(&config);
			Ok(())
		},
		Command::Account => account(config).await,
		Command::Swap(swap_args) => swap(config, swap_args).await,
	}
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
	let api = config
		.api
		.clone()
		.filter(|api| api.enabled)
		.ok_or("the [api] section is missing or disabled")?;

	tokio::select! {
		result = server::start_server(&config, api) => {
			tracing::info!("API server finished");
			result?;
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Shutting down");
		}
	}
	Ok(())
}

fn list_tokens(config: &Config) {
	let registry = config.token_registry();
	for token in registry.for_chain(config.app.required_chain_id) {
		println!(
			"{:<8} {:>2}  {}  {}",
			token.symbol, token.decimals, token.address, token.name
		);
	}
}

async fn account(config: Config) -> Result<(), Box<dyn std::error::Error>> {
	let engine = SwapEngineBuilder::new(config).build()?;
	let wallet = engine.wallet();
	wallet.connect().await?;
	let (address, chain_id) = wallet.connected().await?;
	let balance = wallet.delivery().get_balance(address, None).await?;

	println!("Address: {}", address);
	println!("Chain:   {}", chain_id);
	println!("Balance: {}", format_amount(balance, 18));
	if let Some(prompt) = wallet.view().await?.prompt() {
		println!("{}", prompt);
	}
	Ok(())
}

async fn swap(config: Config, args: SwapArgs) -> Result<(), Box<dyn std::error::Error>> {
	let engine = SwapEngineBuilder::new(config).build()?;
	let wallet = engine.wallet();

	wallet.connect().await?;
	if let SwapView::WrongChain { current, required } = wallet.view().await? {
		tracing::info!(current, required, "Switching chain");
		wallet.switch_chain(required).await?;
	}
	if !wallet.is_authenticated().await {
		let session = wallet.sign_in().await?;
		tracing::info!(address = %session.address, "Signed in");
	}

	let pipeline = engine.open_form();
	let applied = pipeline
		.update_price(
			&args.sell,
			&args.buy,
			args.amount.as_deref(),
			args.buy_amount.as_deref(),
		)
		.await?;
	let snapshot = pipeline.snapshot().await;
	if applied == PriceApplied::Rejected {
		for issue in &snapshot.issues {
			println!("{}: {}", issue.field, issue.reason);
		}
		return Err("the pricing service rejected the request".into());
	}

	let price = snapshot.price.as_ref().ok_or("no price available")?;
	let sell_decimals = engine.tokens().by_symbol(&args.sell).map_or(18, |t| t.decimals);
	let buy_decimals = engine.tokens().by_symbol(&args.buy).map_or(18, |t| t.decimals);
	println!(
		"{} {} -> {} {}",
		format_amount(price.sell_amount, sell_decimals),
		args.sell,
		format_amount(price.buy_amount, buy_decimals),
		args.buy
	);

	if let Some(AllowanceStatus::Insufficient { spender, .. }) = &snapshot.allowance {
		println!("Approving {} to spend {}", spender, args.sell);
		pipeline.approve().await?;
	}
	if let Some(reason) = pipeline.snapshot().await.blocked_by {
		pipeline.close().await;
		return Err(reason.into());
	}
	if args.dry_run {
		pipeline.close().await;
		return Ok(());
	}

	pipeline.finalize().await?;
	let pending = pipeline.submit().await?;
	println!("Submitted: {}", pending.explorer_url);

	match pipeline.watch().await? {
		TransactionStatus::Confirmed(receipt) => {
			println!("Confirmed in block {}", receipt.block_number);
			Ok(())
		},
		TransactionStatus::Failed(reason) => Err(reason.into()),
		TransactionStatus::Pending => Err("transaction still pending".into()),
	}
}
