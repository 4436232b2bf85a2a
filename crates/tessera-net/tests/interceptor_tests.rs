//! Request interception tests.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tessera_net::http::{AdaptCompletion, HttpRequest};
use tessera_net::{Endpoint, HttpService, HttpServiceError, TransportError};

use common::{MockTransport, Recorder, Reply, completed, error_of};

fn profile() -> Endpoint {
    Endpoint::new("https://api.example.com", "/me").with_interception(true)
}

#[test]
fn test_interceptor_adds_token() {
    let transport = MockTransport::new([Reply::Status(200, "{}")]);
    let service = HttpService::with_transport(transport.clone());
    service.set_request_interceptor(|mut request: HttpRequest, completion: AdaptCompletion| {
        match request.bearer_auth("t0k3n") {
            Ok(()) => completion.proceed(request),
            Err(err) => completion.complete(Err(err)),
        }
    });

    let (recorder, events) = Recorder::new();
    service.request_json(&profile()).subscribe(recorder);

    assert!(completed(&events.lock()));
    assert_eq!(
        transport.requests()[0].header("authorization"),
        Some("Bearer t0k3n")
    );
}

#[test]
fn test_endpoints_without_interception_bypass_hook() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let transport = MockTransport::new([Reply::Status(200, "{}")]);
    let service = HttpService::with_transport(transport.clone());
    service.set_request_interceptor(move |request: HttpRequest, completion: AdaptCompletion| {
        counter.fetch_add(1, Ordering::SeqCst);
        completion.proceed(request);
    });

    service
        .request_json(&profile().with_interception(false))
        .subscribe_with(|_| {}, |_| {}, || {});

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(transport.request_count(), 1);
}

#[test]
fn test_rejection_fails_without_sending() {
    let transport = MockTransport::new([Reply::Status(200, "{}")]);
    let service = HttpService::with_transport(transport.clone());
    service.set_request_interceptor(|_: HttpRequest, completion: AdaptCompletion| {
        completion.reject("not signed in");
    });

    let (recorder, events) = Recorder::new();
    service
        .request_raw(&profile().with_retries(0))
        .subscribe(recorder);

    match error_of(&events.lock()) {
        Some(HttpServiceError::Unknown(Some(TransportError::Interception(message)))) => {
            assert_eq!(message, "not signed in");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(transport.request_count(), 0);
}

#[test]
fn test_every_retry_passes_interceptor_again() {
    let passes = Arc::new(AtomicUsize::new(0));
    let counter = passes.clone();
    let transport = MockTransport::new([
        Reply::Fail(TransportError::Timeout),
        Reply::Status(200, "{}"),
    ]);
    let service = HttpService::with_transport(transport.clone());
    service.set_request_interceptor(move |mut request: HttpRequest, completion: AdaptCompletion| {
        let pass = counter.fetch_add(1, Ordering::SeqCst) + 1;
        match request.set_header("x-attempt", &pass.to_string()) {
            Ok(()) => completion.proceed(request),
            Err(err) => completion.complete(Err(err)),
        }
    });

    service
        .request_raw(&profile().with_retries(1))
        .subscribe_with(|_| {}, |_| {}, || {});

    assert_eq!(passes.load(Ordering::SeqCst), 2);
    let requests = transport.requests();
    assert_eq!(requests[0].header("x-attempt"), Some("1"));
    assert_eq!(requests[1].header("x-attempt"), Some("2"));
}

#[test]
fn test_replacing_interceptor_applies_to_later_requests() {
    let transport = MockTransport::new([Reply::Status(200, "{}")]);
    let service = HttpService::with_transport(transport.clone());

    service.set_request_interceptor(|mut request: HttpRequest, completion: AdaptCompletion| {
        let _ = request.set_header("x-hook", "first");
        completion.proceed(request);
    });
    service
        .request_raw(&profile())
        .subscribe_with(|_| {}, |_| {}, || {});

    service.set_request_interceptor(|mut request: HttpRequest, completion: AdaptCompletion| {
        let _ = request.set_header("x-hook", "second");
        completion.proceed(request);
    });
    service
        .request_raw(&profile())
        .subscribe_with(|_| {}, |_| {}, || {});

    service.clear_request_interceptor();
    service
        .request_raw(&profile())
        .subscribe_with(|_| {}, |_| {}, || {});

    let requests = transport.requests();
    assert_eq!(requests[0].header("x-hook"), Some("first"));
    assert_eq!(requests[1].header("x-hook"), Some("second"));
    assert_eq!(requests[2].header("x-hook"), None);
}

#[test]
fn test_asynchronous_interceptor() {
    let transport = MockTransport::new([Reply::Status(200, "{}")]);
    let service = HttpService::with_transport(transport.clone());
    service.set_request_interceptor(|mut request: HttpRequest, completion: AdaptCompletion| {
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            let _ = request.bearer_auth("refreshed");
            completion.proceed(request);
        });
    });

    let (done_tx, done_rx) = std::sync::mpsc::channel();
    let done_tx = Mutex::new(done_tx);
    service.request_json(&profile()).subscribe_with(
        |_| {},
        |error| panic!("unexpected {error}"),
        move || {
            let _ = done_tx.lock().send(());
        },
    );

    done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(
        transport.requests()[0].header("authorization"),
        Some("Bearer refreshed")
    );
}

#[test]
fn test_dispose_before_interceptor_answers_skips_transport() {
    let parked: Arc<Mutex<Option<(HttpRequest, AdaptCompletion)>>> = Arc::new(Mutex::new(None));
    let slot = parked.clone();
    let transport = MockTransport::new([Reply::Status(200, "{}")]);
    let service = HttpService::with_transport(transport.clone());
    service.set_request_interceptor(move |request: HttpRequest, completion: AdaptCompletion| {
        *slot.lock() = Some((request, completion));
    });

    let (recorder, events) = Recorder::new();
    let subscription = service.request_raw(&profile()).subscribe(recorder);
    subscription.dispose();

    let (request, completion) = parked.lock().take().unwrap();
    completion.proceed(request);

    assert_eq!(transport.request_count(), 0);
    assert!(events.lock().is_empty());
}
