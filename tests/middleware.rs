//! Quota gating as a tower layer.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tower::{service_fn, Layer, ServiceExt};
    use turnstile::{
        BucketConfig, GateError, ManualClock, MemoryBucketFactory, NamespaceConfig, QuotaKey,
        QuotaLayer, QuotaService, ServiceConfig,
    };

    fn quota_service(cfg: ServiceConfig) -> Arc<QuotaService> {
        let clock = Arc::new(ManualClock::new());
        clock.advance(Duration::from_secs(60));
        Arc::new(
            QuotaService::new(cfg, Arc::new(MemoryBucketFactory::with_clock(clock)))
                .expect("service builds"),
        )
    }

    fn extractor(req: &&'static str) -> QuotaKey {
        QuotaKey { namespace: "api".into(), name: (*req).into(), tokens: 1 }
    }

    async fn echo(req: &'static str) -> Result<&'static str, std::convert::Infallible> {
        Ok(req)
    }

    #[tokio::test]
    async fn grants_pass_through_to_the_inner_service() {
        let service = quota_service(ServiceConfig::default().with_namespace(
            "api",
            NamespaceConfig::default().with_bucket("ping", BucketConfig::new(100, 100)),
        ));
        let layer = QuotaLayer::new(service, extractor);
        let gated = layer.layer(service_fn(echo));

        let rsp = gated.oneshot("ping").await.expect("allowed through");
        assert_eq!(rsp, "ping");
    }

    #[tokio::test]
    async fn unresolvable_keys_surface_no_such_bucket() {
        let service = quota_service(ServiceConfig::default().with_namespace(
            "api",
            NamespaceConfig::default().with_bucket("ping", BucketConfig::new(100, 100)),
        ));
        let layer = QuotaLayer::new(service, extractor);
        let gated = layer.layer(service_fn(echo));

        match gated.oneshot("unknown").await {
            Err(GateError::Quota(e)) => assert!(e.is_no_such_bucket()),
            other => panic!("expected quota error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn exhausted_buckets_surface_timed_out() {
        let service = quota_service(
            ServiceConfig::default()
                .with_default_max_wait_millis(1)
                .with_namespace(
                    "api",
                    NamespaceConfig::default().with_bucket("ping", BucketConfig::new(100, 10)),
                ),
        );
        service.allow("api", "ping", 10, Some(Duration::ZERO)).await.expect("drain");

        let layer = QuotaLayer::new(service, extractor);
        let gated = layer.layer(service_fn(echo));

        match gated.oneshot("ping").await {
            Err(GateError::Quota(e)) => assert!(e.is_timed_out()),
            other => panic!("expected quota error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn waits_are_absorbed_before_forwarding() {
        let service = quota_service(ServiceConfig::default().with_namespace(
            "api",
            NamespaceConfig::default().with_bucket("ping", BucketConfig::new(100, 10)),
        ));
        service.allow("api", "ping", 10, Some(Duration::ZERO)).await.expect("drain");

        let layer = QuotaLayer::new(service, extractor);
        let gated = layer.layer(service_fn(echo));

        let start = tokio::time::Instant::now();
        let rsp = gated.oneshot("ping").await.expect("granted after the wait");
        assert_eq!(rsp, "ping");
        assert!(start.elapsed() >= Duration::from_millis(10), "grant wait was slept through");
    }
}
