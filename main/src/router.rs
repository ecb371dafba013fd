use crate::chat::ChatMessage;
use crate::chat::ChatStore;
use crate::http::HttpRequest;
use crate::http::HttpResponse;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_MESSAGE_LIMIT: usize = 50;
const LIMIT_HEADER: &str = "X-Limit";

type Handler = Box<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

/// Fixed route table keyed by `"<METHOD>:<PATH>"`.
pub struct Router {
    routes: HashMap<String, Handler>,
}

impl Router {
    pub fn new(chat_store: Arc<ChatStore>, chat_page: String) -> Self {
        let chat_page: Arc<str> = chat_page.into();
        let mut router = Self {
            routes: HashMap::default(),
        };

        for path in ["/", "/chat"] {
            let chat_page = chat_page.clone();
            router.add("GET", path, move |_| HttpResponse::html(&chat_page));
        }
        router.add("GET", "/api/status", |_| get_status());
        let store = chat_store.clone();
        router.add("GET", "/api/messages", move |r| get_messages(&store, r));
        router.add("POST", "/api/messages", move |r| post_message(&chat_store, r));

        router
    }

    fn add(
        &mut self,
        method: &str,
        path: &str,
        handler: impl Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    ) {
        self.routes
            .insert(route_key(method, path), Box::new(handler));
    }

    pub fn route(&self, request: &HttpRequest) -> HttpResponse {
        match self.routes.get(&route_key(request.method(), request.path())) {
            Some(handler) => handler(request),
            None => HttpResponse::not_found(),
        }
    }
}

fn route_key(method: &str, path: &str) -> String {
    format!("{}:{}", method, path)
}

#[derive(Serialize)]
struct StatusBody {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct MessagesBody {
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct NewMessage {
    username: String,
    content: String,
}

#[derive(Serialize)]
struct PostedBody {
    status: &'static str,
    id: String,
}

fn get_status() -> HttpResponse {
    HttpResponse::json(&StatusBody {
        status: "running",
        service: "FacingTime WebServer",
        version: "1.0.0",
    })
}

fn get_messages(store: &ChatStore, request: &HttpRequest) -> HttpResponse {
    let limit = request
        .header(LIMIT_HEADER)
        .and_then(|l| l.parse().ok())
        .unwrap_or(DEFAULT_MESSAGE_LIMIT);
    HttpResponse::json(&MessagesBody {
        messages: store.recent(Some(limit)),
    })
}

fn post_message(store: &ChatStore, request: &HttpRequest) -> HttpResponse {
    let Some(body) = request.body() else {
        return HttpResponse::bad_request();
    };
    let message: NewMessage = match serde_json::from_slice(body) {
        Ok(m) => m,
        Err(e) => {
            log::debug!("Rejecting a chat message: {}", e);
            return HttpResponse::bad_request();
        }
    };
    let message = store.append(message.username, message.content);
    log::info!("New chat message {} from {}", message.id, message.username);
    HttpResponse::json(&PostedBody {
        status: "ok",
        id: message.id,
    })
}
