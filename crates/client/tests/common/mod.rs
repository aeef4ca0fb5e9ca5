#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use api_types::{BranchId, auth::Role, user::User};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use client::{
    Client, ClientConfig, Esponja, MemorySessionStorage, PersistedSession, SessionStorage,
};
use serde_json::{Value, json};

/// A request as the server saw it.
#[derive(Clone, Debug)]
pub struct Seen {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub branch: Option<String>,
    pub body: Option<Value>,
}

#[derive(Clone, Debug)]
pub struct Reply {
    status: StatusCode,
    body: Value,
    delay: Option<Duration>,
}

impl Reply {
    pub fn ok(data: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: json!({"success": true, "data": data}),
            delay: None,
        }
    }

    pub fn failure(message: &str) -> Self {
        Self {
            status: StatusCode::OK,
            body: json!({"success": false, "message": message}),
            delay: None,
        }
    }

    pub fn status(status: u16, body: Value) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            body,
            delay: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self::status(401, json!({"success": false, "message": "Token inválido"}))
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Default)]
struct MockState {
    routes: HashMap<(String, String), VecDeque<Reply>>,
    seen: Vec<Seen>,
}

type Shared = Arc<Mutex<MockState>>;

/// In-process stand-in for the REST API.
///
/// Replies registered for a route are served in order; the last one keeps
/// being served.
pub struct MockApi {
    addr: SocketAddr,
    state: Shared,
}

impl MockApi {
    pub async fn start() -> Self {
        let state: Shared = Arc::default();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new().fallback(handle).with_state(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn on(&self, method: &str, path: &str, reply: Reply) -> &Self {
        let key = (method.to_string(), format!("/api/{path}"));
        self.state
            .lock()
            .unwrap()
            .routes
            .entry(key)
            .or_default()
            .push_back(reply);
        self
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.state.lock().unwrap().seen.clone()
    }

    pub fn last(&self) -> Seen {
        self.seen().last().cloned().expect("no request reached the mock")
    }
}

async fn handle(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    let reply = {
        let mut guard = state.lock().unwrap();
        guard.seen.push(Seen {
            method: method.to_string(),
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            authorization: header("authorization"),
            branch: header("x-sucursal-id"),
            body: serde_json::from_slice(&body).ok(),
        });

        let key = (method.to_string(), uri.path().to_string());
        match guard.routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        }
    };

    let Some(reply) = reply else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "message": "ruta no encontrada"})),
        )
            .into_response();
    };

    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }
    (reply.status, Json(reply.body)).into_response()
}

pub fn user(id: i64, role: &str, branch: Option<i64>) -> User {
    User {
        id,
        name: format!("user{id}"),
        email: None,
        role: Role::parse(role),
        branch_id: branch.map(BranchId),
    }
}

pub fn signed_in(role: &str, branch: Option<i64>) -> PersistedSession {
    PersistedSession::signed_in("secret-token".to_string(), &user(1, role, branch))
}

pub fn storage(session: PersistedSession) -> Arc<MemorySessionStorage> {
    Arc::new(MemorySessionStorage::new(session))
}

pub fn client_for(api: &MockApi, storage: Arc<MemorySessionStorage>) -> Client {
    let storage: Arc<dyn SessionStorage> = storage;
    Client::new(&ClientConfig::new(api.base_url()), storage).unwrap()
}

pub fn esponja_for(api: &MockApi, storage: Arc<MemorySessionStorage>) -> Esponja {
    Esponja::new(client_for(api, storage))
}

pub fn product_json(id: i64, branch: i64) -> Value {
    json!({
        "id": id,
        "code": format!("P{id}"),
        "name": format!("Producto {id}"),
        "category": null,
        "price": 1200.5,
        "cost": null,
        "branchId": branch,
        "stock": 4
    })
}
