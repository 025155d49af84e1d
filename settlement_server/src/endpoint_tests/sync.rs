//! Synchronizer runs against live sockets: one provider per TCP stub, so per-provider timeout
//! isolation is exercised for real rather than through a mocked client.

use std::time::Duration;

use settlement_engine::{
    db_types::{NewOrder, OrderStatus},
    test_utils::prepare_test_db,
    OrderManagement,
    OrderSyncApi,
    SettlementDatabase,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

use crate::{providers::ProviderClient, status_worker::run_sync};

fn request_complete(buf: &[u8]) -> bool {
    let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
        return false;
    };
    let headers = String::from_utf8_lossy(&buf[..pos]);
    let content_length = headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length").then(|| value.trim().to_string())
        })
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    buf.len() >= pos + 4 + content_length
}

/// Serve `response_body` as JSON to every status poll on a fresh local port.
async fn provider_stub(response_body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                    if request_complete(&buf) {
                        break;
                    }
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{response_body}",
                    response_body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });
    url
}

/// Accept connections and never answer them. The client's timeout is the only way out.
async fn stalled_provider_stub() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(600)).await;
                drop(socket);
            });
        }
    });
    url
}

#[tokio::test]
async fn one_stalled_provider_does_not_block_the_others() {
    let db = prepare_test_db().await;
    let account = db.create_account().await.unwrap();

    let stalled_url = stalled_provider_stub().await;
    let healthy_url = provider_stub(r#"{"b-1": {"status": "Completed", "remains": 0}}"#).await;
    let stalled = db.insert_provider("smm-stalled", &stalled_url, "key-a").await.unwrap();
    let healthy = db.insert_provider("smm-healthy", &healthy_url, "key-b").await.unwrap();
    for id in ["s-1", "s-2"] {
        db.insert_order(NewOrder {
            account_id: account.id,
            provider_id: stalled.id,
            external_order_id: id.to_string(),
            quantity: 100,
        })
        .await
        .unwrap();
    }
    db.insert_order(NewOrder {
        account_id: account.id,
        provider_id: healthy.id,
        external_order_id: "b-1".to_string(),
        quantity: 100,
    })
    .await
    .unwrap();

    let api = OrderSyncApi::new(db.clone());
    let client = ProviderClient::new(Duration::from_millis(250)).unwrap();
    let report = run_sync(&api, &client, 100).await;

    // The stalled provider's orders were checked but failed; the healthy one's update landed
    assert_eq!(report.checked, 3);
    assert_eq!(report.updated, 1);
    assert_eq!(report.errors, 2);

    let order = db.fetch_order(healthy.id, "b-1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    for id in ["s-1", "s-2"] {
        let order = db.fetch_order(stalled.id, id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending, "order [{id}] must stay due for the next run");
    }
}
