//! Integration tests for the bounded endpoint-polling helper.

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use uma_probe::{
	Error, Result,
	http::{Gateway, wait_for_endpoint},
};
use url::Url;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{method, path},
};

#[tokio::test]
async fn succeeds_once_the_endpoint_comes_up() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let counter = Arc::new(AtomicUsize::new(0));
	let counter_handle = counter.clone();

	Mock::given(method("GET"))
		.and(path("/health"))
		.respond_with(move |_: &wiremock::Request| {
			match counter_handle.fetch_add(1, Ordering::SeqCst) {
				0 | 1 => ResponseTemplate::new(503),
				_ => ResponseTemplate::new(200),
			}
		})
		.mount(&server)
		.await;

	let gateway = Gateway::new(true)?;
	let url = Url::parse(&format!("{}/health", server.uri()))?;

	wait_for_endpoint(&gateway, &url, 5, Duration::from_millis(10)).await?;

	assert_eq!(counter.load(Ordering::SeqCst), 3);
	Ok(())
}

#[tokio::test]
async fn gives_up_after_the_iteration_budget() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/health"))
		.respond_with(ResponseTemplate::new(503))
		.expect(2)
		.mount(&server)
		.await;

	let gateway = Gateway::new(true)?;
	let url = Url::parse(&format!("{}/health", server.uri()))?;
	let err = wait_for_endpoint(&gateway, &url, 2, Duration::from_millis(10)).await.unwrap_err();

	assert!(matches!(err, Error::EndpointUnavailable { attempts: 2, .. }));

	server.verify().await;
	Ok(())
}
