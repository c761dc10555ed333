use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = bio_api::Args::parse();

	bio_api::run(args).await
}
