//! # Checkout Sessions
//!
//! Builds the session payload from the current engine state, posts it and
//! turns the returned session id into the hosted checkout URL.
//!
//! Only one session request may be in flight per instance. Observers are told
//! when a request starts and ends so a checkout control can be disabled in
//! between.

use crate::sdk::Sline;
use sline_core::{
    CheckoutSession, LineItem, SessionRequest, SessionResponse, SlineError, SlineEvent,
    SlineResult,
};
use tracing::{error, info, instrument, warn};

/// Clears the in-flight flag however the request ends.
///
/// Only the context that set the flag may clear it: after a
/// re-initialization the flag belongs to the new context.
struct CheckoutGuard<'a> {
    sline: &'a Sline,
    epoch: u64,
}

impl Drop for CheckoutGuard<'_> {
    fn drop(&mut self) {
        let owned = {
            let mut state = self.sline.state();
            let owned = state.epoch == self.epoch;
            if owned {
                state.checkout_in_flight = false;
            }
            owned
        };
        if owned {
            self.sline
                .publish(SlineEvent::CheckoutPending { in_flight: false });
        }
    }
}

impl Sline {
    /// Create a checkout session for the current cart
    pub async fn build_session(&self) -> SlineResult<CheckoutSession> {
        let items = self.state().line_items.items().to_vec();
        self.build_session_for(&items).await
    }

    /// Create a checkout session for `items`.
    ///
    /// Customer, addresses, selected duration and options come from the
    /// engine state. Success is HTTP 201 only; on any other outcome the
    /// stored checkout URL is left unchanged. A session that completes after
    /// a re-initialization is returned but not stored or announced.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn build_session_for(&self, items: &[LineItem]) -> SlineResult<CheckoutSession> {
        if items.is_empty() {
            return Err(SlineError::EmptyCart);
        }

        let (config, payload, selected_duration, epoch) = {
            let mut state = self.state();
            let config = state.config()?.clone();
            if state.checkout_in_flight {
                return Err(SlineError::CheckoutInProgress);
            }

            let selected_duration = state.selected_duration();
            let payload = SessionRequest {
                line_items: items,
                billing_address: state.billing_address.as_ref(),
                shipping_address: state.shipping_address.as_ref(),
                customer: state.customer.as_ref(),
                selected_duration,
                options: Some(&state.options),
            }
            .to_payload()?;

            state.checkout_in_flight = true;
            (config, payload, selected_duration, state.epoch)
        };

        let guard = CheckoutGuard { sline: self, epoch };
        self.publish(SlineEvent::CheckoutPending { in_flight: true });

        let response = self
            .inner
            .transport
            .post_json(&config.sessions_endpoint(), &config.auth_header(), &payload)
            .await
            .map_err(|e| SlineError::CheckoutSession {
                status: None,
                body: e.to_string(),
            })?;

        if response.status != 201 {
            error!(
                "Checkout session creation failed: status={}, body={}",
                response.status, response.body
            );
            return Err(SlineError::CheckoutSession {
                status: Some(response.status),
                body: response.body,
            });
        }

        let created: SessionResponse =
            response.json().map_err(|_| SlineError::CheckoutSession {
                status: Some(response.status),
                body: response.body.clone(),
            })?;
        let url = config.redirect_url(&created.id);

        let current = {
            let mut state = self.state();
            let current = state.epoch == epoch;
            if current {
                state.checkout_url = Some(url.clone());
            }
            current
        };
        drop(guard);

        if current {
            info!(session_id = %created.id, "Checkout session created");
            self.publish(SlineEvent::CheckoutUrlReady {
                session_id: created.id.clone(),
                url: url.clone(),
            });
        } else {
            warn!(session_id = %created.id, "Session created for a replaced configuration");
        }

        Ok(CheckoutSession::new(
            created.id,
            url,
            selected_duration,
            created.details,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{plans_body, test_config, MockTransport, RecordingHandler};
    use serde_json::{json, Map, Value};
    use sline_core::{Address, Customer};
    use std::sync::Arc;
    use std::time::Duration;

    fn setup() -> (Sline, Arc<MockTransport>, Arc<RecordingHandler>) {
        let transport = Arc::new(MockTransport::new());
        let sline = Sline::new(transport.clone());
        sline.initialize(test_config()).unwrap();
        let recorder = Arc::new(RecordingHandler::default());
        sline.subscribe(recorder.clone());
        (sline, transport, recorder)
    }

    async fn priced_cart(sline: &Sline, transport: &MockTransport) {
        transport.respond(200, plans_body(&["sku-1"], &[3, 6, 12]));
        sline
            .add_line_item(LineItem::new("sku-1", 1), 2)
            .unwrap()
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_cart_after_reset() {
        let (sline, transport, _) = setup();
        priced_cart(&sline, &transport).await;
        sline.reset_line_items();

        assert_eq!(sline.build_session().await.unwrap_err(), SlineError::EmptyCart);
        assert_eq!(
            sline.build_session_for(&[]).await.unwrap_err(),
            SlineError::EmptyCart
        );
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_requires_initialize() {
        let sline = Sline::new(Arc::new(MockTransport::new()));
        let items = [LineItem::new("sku-1", 1)];
        assert_eq!(
            sline.build_session_for(&items).await.unwrap_err(),
            SlineError::NotInitialized
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_created() {
        let (sline, transport, recorder) = setup();
        priced_cart(&sline, &transport).await;
        sline.set_selected_duration(6).unwrap();
        sline.add_customer(Customer::with_email("jane@example.com").with_name("Jane", "Doe"));
        sline.add_billing_address(Address::new("1 rue de Rivoli", "Paris", "75001", "FR"));
        transport.respond(201, json!({ "id": "sess_42", "total_with_tax": 24000 }));

        let session = sline.build_session().await.unwrap();

        assert_eq!(session.session_id, "sess_42");
        assert_eq!(
            session.checkout_url,
            "https://checkout.test/checkout/sess_42?retailerApiKey=rt_test"
        );
        assert_eq!(session.selected_duration, Some(6));
        assert_eq!(session.details["total_with_tax"], 24000);
        assert_eq!(sline.checkout_url().as_deref(), Some(session.checkout_url.as_str()));

        let request = &transport.requests()[1];
        assert_eq!(request.url, "https://api.test/v1/sessions");
        assert_eq!(request.auth_header, "Bearer rt_test");
        assert_eq!(request.body["selected_duration"], 6);
        assert_eq!(
            request.body["line_items_attributes"],
            json!([{ "reference": "sku-1", "quantity": 2 }])
        );
        assert_eq!(
            request.body["session_customer_attributes"]["email"],
            "jane@example.com"
        );
        assert_eq!(request.body["billing_address_attributes"]["city"], "Paris");
        assert!(request.body.get("shipping_address_attributes").is_none());

        assert_eq!(
            recorder.events()[3..],
            [
                "checkout_pending:true".to_string(),
                "checkout_pending:false".to_string(),
                format!("checkout_url:{}", session.checkout_url),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_options_win() {
        let (sline, transport, _) = setup();
        priced_cart(&sline, &transport).await;
        sline.set_selected_duration(6).unwrap();

        let mut options = Map::new();
        options.insert("selected_duration".to_string(), Value::from(99));
        options.insert("locale".to_string(), Value::from("fr"));
        sline.set_options(options);
        transport.respond(201, json!({ "id": "sess_1" }));

        sline.build_session().await.unwrap();

        let body = &transport.requests()[1].body;
        assert_eq!(body["selected_duration"], 99);
        assert_eq!(body["locale"], "fr");
    }

    #[tokio::test]
    async fn test_no_selected_duration_without_prices() {
        let (sline, transport, _) = setup();
        transport.respond(201, json!({ "id": "sess_1" }));

        let session = sline
            .build_session_for(&[LineItem::new("sku-1", 1)])
            .await
            .unwrap();

        assert_eq!(session.selected_duration, None);
        assert!(transport.requests()[0].body.get("selected_duration").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_keeps_url() {
        let (sline, transport, recorder) = setup();
        priced_cart(&sline, &transport).await;
        transport.respond(201, json!({ "id": "sess_1" }));
        let first = sline.build_session().await.unwrap();

        transport.respond_raw(500, r#"{"error":"boom"}"#);
        let err = sline.build_session().await.unwrap_err();

        assert_eq!(
            err,
            SlineError::CheckoutSession {
                status: Some(500),
                body: r#"{"error":"boom"}"#.to_string()
            }
        );
        assert_eq!(sline.checkout_url(), Some(first.checkout_url));
        assert!(!sline.is_checkout_pending());
        assert_eq!(
            recorder.events().last().map(String::as_str),
            Some("checkout_pending:false")
        );
    }

    #[tokio::test]
    async fn test_only_201_is_success() {
        let (sline, transport, _) = setup();
        transport.respond(200, json!({ "id": "sess_1" }));

        let err = sline
            .build_session_for(&[LineItem::new("sku-1", 1)])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SlineError::CheckoutSession {
                status: Some(200),
                ..
            }
        ));
        assert_eq!(sline.checkout_url(), None);
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let (sline, transport, _) = setup();
        transport.fail("connection refused");

        let err = sline
            .build_session_for(&[LineItem::new("sku-1", 1)])
            .await
            .unwrap_err();

        assert!(matches!(err, SlineError::CheckoutSession { status: None, .. }));
        assert!(!sline.is_checkout_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_checkout_while_pending() {
        let (sline, transport, _) = setup();
        transport.respond_after(Duration::from_millis(100), 201, json!({ "id": "sess_1" }));
        let items = vec![LineItem::new("sku-1", 1)];

        let pending = {
            let sline = sline.clone();
            let items = items.clone();
            tokio::spawn(async move { sline.build_session_for(&items).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(sline.is_checkout_pending());

        assert_eq!(
            sline.build_session_for(&items).await.unwrap_err(),
            SlineError::CheckoutInProgress
        );

        pending.await.unwrap().unwrap();
        assert!(!sline.is_checkout_pending());
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tax_change_during_checkout_keeps_url() {
        let (sline, transport, recorder) = setup();
        transport.respond_after(Duration::from_millis(100), 201, json!({ "id": "sess_1" }));

        let pending = {
            let sline = sline.clone();
            tokio::spawn(async move {
                sline.build_session_for(&[LineItem::new("sku-1", 1)]).await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        sline.set_tax_rate(5.5).unwrap();

        let session = pending.await.unwrap().unwrap();

        assert_eq!(sline.checkout_url(), Some(session.checkout_url.clone()));
        assert_eq!(
            recorder.events(),
            vec![
                "checkout_pending:true".to_string(),
                "checkout_pending:false".to_string(),
                format!("checkout_url:{}", session.checkout_url),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinitialize_during_checkout() {
        let (sline, transport, recorder) = setup();
        transport.respond_after(Duration::from_millis(100), 201, json!({ "id": "sess_a" }));
        transport.respond_after(Duration::from_millis(500), 201, json!({ "id": "sess_b" }));

        let spawn_checkout = |sline: &Sline| {
            let sline = sline.clone();
            tokio::spawn(async move {
                sline.build_session_for(&[LineItem::new("sku-1", 1)]).await
            })
        };

        let first = spawn_checkout(&sline);
        tokio::time::sleep(Duration::from_millis(10)).await;

        // same configuration, still a new context
        sline.initialize(test_config()).unwrap();
        assert!(!sline.is_checkout_pending());

        let second = spawn_checkout(&sline);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let stale = first.await.unwrap().unwrap();
        assert_eq!(stale.session_id, "sess_a");
        assert_eq!(sline.checkout_url(), None);
        assert!(sline.is_checkout_pending());
        assert_eq!(
            sline
                .build_session_for(&[LineItem::new("sku-1", 1)])
                .await
                .unwrap_err(),
            SlineError::CheckoutInProgress
        );

        let current = second.await.unwrap().unwrap();
        assert_eq!(sline.checkout_url(), Some(current.checkout_url.clone()));
        assert!(!sline.is_checkout_pending());
        assert_eq!(transport.request_count(), 2);
        assert_eq!(
            recorder.events(),
            vec![
                "checkout_pending:true".to_string(),
                "checkout_pending:true".to_string(),
                "checkout_pending:false".to_string(),
                format!("checkout_url:{}", current.checkout_url),
            ]
        );
    }
}
