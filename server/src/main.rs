use std::env;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use futures::future::{self, Ready};
use futures::{Future, StreamExt};
use tarpc::server::{self, Channel};
use tarpc::tokio_serde::formats::Json;
use tracing::*;

use tavern_server::server::TavernServer;
use tavern_server::types::TavernApi;
use tavern_shared::Principal;

const DEFAULT_PORT: u16 = 5051;

async fn spawn(fut: impl Future<Output = ()> + Send + 'static) {
	tokio::spawn(fut);
}

fn keep_ok<T, E: std::fmt::Display>(result: Result<T, E>) -> Ready<Option<T>> {
	match result {
		Ok(value) => future::ready(Some(value)),
		Err(e) => {
			warn!("Failed to accept connection: {}", e);
			future::ready(None)
		}
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let _ = dotenvy::dotenv();
	tracing_subscriber::fmt::init();

	let address = match env::var("TAVERN_ADDRESS") {
		Ok(address) => address.parse::<SocketAddr>()?,
		Err(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), DEFAULT_PORT),
	};

	let authority = match env::var("TAVERN_ADMIN").ok().and_then(|admin| Principal::parse(&admin)) {
		Some(admin) => {
			info!("Bootstrap admin: {}", admin);
			TavernServer::with_admin(admin)
		}
		None => TavernServer::new(),
	};

	let mut listener = tarpc::serde_transport::tcp::listen(&address, Json::default).await?;
	info!("Listening on port {}", listener.local_addr().port());
	listener.config_mut().max_frame_length(usize::MAX);

	listener
		.filter_map(keep_ok)
		.map(server::BaseChannel::with_defaults)
		.map(|channel| channel.execute(authority.clone().serve()).for_each(spawn))
		.buffer_unordered(64)
		.for_each(|_| async {})
		.await;

	Ok(())
}
