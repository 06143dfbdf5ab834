//! Fairness specs
//!
//! Verify first-come-first-served grants and purging of departed clients.

use crate::prelude::*;

const HOLD: Duration = Duration::from_millis(500);

#[tokio::test]
async fn clients_are_granted_in_request_order() {
    let cluster = Cluster::start(HOLD).await;
    let mut first = cluster.session("1").await;
    let mut second = cluster.session("2").await;
    let mut third = cluster.session("3").await;

    first.request_access().await.unwrap();
    first.await_grant().await.unwrap();
    third.request_access().await.unwrap();
    cluster.queue_is(&["3"]).await;
    second.request_access().await.unwrap();
    cluster.queue_is(&["3", "2"]).await;

    let order = Arc::new(Mutex::new(Vec::new()));
    let mut waiters = Vec::new();
    for mut session in [third, second] {
        let order = Arc::clone(&order);
        waiters.push(tokio::spawn(async move {
            session.await_grant().await.unwrap();
            order.lock().unwrap().push(session.id().to_string());
            session.await_release().await.unwrap();
        }));
    }
    first.await_release().await.unwrap();
    for waiter in waiters {
        waiter.await.unwrap();
    }

    assert_eq!(*order.lock().unwrap(), vec!["3", "2"]);
}

#[tokio::test]
async fn queued_client_that_disconnects_is_never_granted() {
    let cluster = Cluster::start(HOLD).await;
    let mut first = cluster.session("1").await;
    let mut second = cluster.session("2").await;
    let mut third = cluster.session("3").await;

    first.request_access().await.unwrap();
    first.await_grant().await.unwrap();
    second.request_access().await.unwrap();
    cluster.queue_is(&["2"]).await;
    third.request_access().await.unwrap();
    cluster.queue_is(&["2", "3"]).await;
    third.close().await;
    cluster.queue_is(&["2"]).await;

    first.await_release().await.unwrap();
    second.await_grant().await.unwrap();
    second.await_release().await.unwrap();
    cluster.holder_is(None).await;

    let counts = cluster.grant_counts();
    assert_eq!(counts.get("1"), Some(&1));
    assert_eq!(counts.get("2"), Some(&1));
    assert_eq!(counts.get("3"), Some(&0));
    assert!(!cluster.connected("3"));
    assert!(cluster.queue().is_empty());
}

#[tokio::test]
async fn holder_that_disconnects_passes_the_grant_on() {
    let cluster = Cluster::start(Duration::from_secs(30)).await;
    let mut first = cluster.session("1").await;
    let mut second = cluster.session("2").await;

    first.request_access().await.unwrap();
    first.await_grant().await.unwrap();
    second.request_access().await.unwrap();
    cluster.queue_is(&["2"]).await;

    first.close().await;

    tokio::time::timeout(WAIT, second.await_grant())
        .await
        .unwrap()
        .unwrap();
    cluster.holder_is(Some("2")).await;
}
