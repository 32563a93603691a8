//! Bootstrap handshake behavior: init payload aggregation, mount-order
//! independence, embedder re-targeting, and endpoint unregistration.

use std::future::IntoFuture;
use std::time::Duration;

use serde_json::json;
use tokio::time::timeout;

use blockbus::{
    //
    unregister,
    CoreConfig,
    CoreHandler,
    Endpoint,
    EventTarget,
    Page,
    PartialEnvelope,
    ServiceConfig,
    ServiceHandler,
    TransportEvent,
    MESSAGE_EVENT_NAME,
};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn init_response_aggregates_service_payloads() {
    // ---
    let page = Page::new();
    let element = EventTarget::new(&page);

    let _embedder = CoreHandler::embedder(
        CoreConfig::new()
            .endpoint(Endpoint::Element(element.clone()))
            .service("graph", json!({"x": 1}))
            .service("hooks", json!({"y": 2})),
    )
    .await
    .unwrap();

    let block = ServiceHandler::block(
        ServiceConfig::new("graph").endpoint(Endpoint::Element(element)),
    )
    .await
    .unwrap();

    let handshake = block
        .core()
        .handshake_complete()
        .expect("block defers its init response");
    let contents = timeout(TEST_TIMEOUT, handshake.into_future())
        .await
        .expect("handshake not answered")
        .unwrap();
    assert_eq!(
        contents.payload,
        Some(json!({"graph": {"x": 1}, "hooks": {"y": 2}}))
    );
}

#[tokio::test]
async fn block_mounted_before_embedder_still_completes() {
    // ---
    let page = Page::new();
    let block_element = EventTarget::new(&page);

    // The block announces itself into an empty page.
    let block = ServiceHandler::block(
        ServiceConfig::new("dummy").endpoint(Endpoint::Element(block_element)),
    )
    .await
    .unwrap();

    // The embedder mounts later and answers from the retained backlog.
    let embedder_element = EventTarget::new(&page);
    let _embedder = ServiceHandler::embedder(
        ServiceConfig::new("dummy")
            .endpoint(Endpoint::Element(embedder_element))
            .init_payload(json!({"ready": true})),
    )
    .await
    .unwrap();

    let handshake = block.core().handshake_complete().unwrap();
    let contents = timeout(TEST_TIMEOUT, handshake.into_future())
        .await
        .expect("handshake not answered")
        .unwrap();
    assert_eq!(contents.payload, Some(json!({"dummy": {"ready": true}})));
}

#[tokio::test]
async fn embedder_retargets_at_the_announcing_element() {
    // ---
    let page = Page::new();
    let embedder_element = EventTarget::new(&page);
    let block_element = EventTarget::new(&page);

    let embedder = ServiceHandler::embedder(
        ServiceConfig::new("dummy").endpoint(Endpoint::Element(embedder_element.clone())),
    )
    .await
    .unwrap();

    let block = ServiceHandler::block(
        ServiceConfig::new("dummy").endpoint(Endpoint::Element(block_element.clone())),
    )
    .await
    .unwrap();
    timeout(
        TEST_TIMEOUT,
        block.core().handshake_complete().unwrap().into_future(),
    )
    .await
    .expect("handshake not answered")
    .unwrap();

    // After the handshake, embedder traffic originates from the element
    // the block announced itself on, not the embedder's original mount.
    let mut wire = embedder_element.listen();
    embedder
        .send_message(PartialEnvelope::named("poke"))
        .await
        .unwrap();

    loop {
        let event = timeout(TEST_TIMEOUT, wire.recv())
            .await
            .expect("poke not observed on the wire")
            .unwrap();
        if let TransportEvent::Custom { name, detail, origin } = event {
            if name.as_ref() == MESSAGE_EVENT_NAME && detail["name"] == json!("poke") {
                assert_eq!(origin.id(), block_element.id());
                break;
            }
        }
    }
}

#[tokio::test]
async fn unregistered_endpoint_gets_a_fresh_handler() {
    // ---
    let page = Page::new();
    let element = EventTarget::new(&page);
    let endpoint = Endpoint::Element(element);

    let _embedder = ServiceHandler::embedder(
        ServiceConfig::new("dummy").endpoint(endpoint.clone()),
    )
    .await
    .unwrap();
    let first = ServiceHandler::block(
        ServiceConfig::new("dummy").endpoint(endpoint.clone()),
    )
    .await
    .unwrap();
    timeout(
        TEST_TIMEOUT,
        first.core().handshake_complete().unwrap().into_future(),
    )
    .await
    .expect("first handshake not answered")
    .unwrap();

    unregister(&endpoint);

    // A new block service on the same endpoint builds a fresh handler and
    // runs the handshake again from scratch.
    let second = ServiceHandler::block(ServiceConfig::new("dummy").endpoint(endpoint))
        .await
        .unwrap();
    let handshake = second
        .core()
        .handshake_complete()
        .expect("fresh handler runs its own handshake");
    timeout(TEST_TIMEOUT, handshake.into_future())
        .await
        .expect("second handshake not answered")
        .unwrap();
}

#[tokio::test]
async fn services_sharing_an_endpoint_share_one_handler() {
    // ---
    let page = Page::new();
    let element = EventTarget::new(&page);
    let endpoint = Endpoint::Element(element);

    let _graph = ServiceHandler::embedder(
        ServiceConfig::new("graph")
            .endpoint(endpoint.clone())
            .init_payload(json!({"x": 1})),
    )
    .await
    .unwrap();
    // The second service attaches to the first one's handler, so a single
    // init is answered for both.
    let _hooks = ServiceHandler::embedder(
        ServiceConfig::new("hooks")
            .endpoint(endpoint.clone())
            .init_payload(json!({"y": 2})),
    )
    .await
    .unwrap();

    let block = ServiceHandler::block(ServiceConfig::new("graph").endpoint(endpoint))
        .await
        .unwrap();
    let contents = timeout(
        TEST_TIMEOUT,
        block.core().handshake_complete().unwrap().into_future(),
    )
    .await
    .expect("handshake not answered")
    .unwrap();
    assert_eq!(
        contents.payload,
        Some(json!({"graph": {"x": 1}, "hooks": {"y": 2}}))
    );
}
