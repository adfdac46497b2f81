//! The storage hop handler.
//!
//! Serves `/<scrambled-table>/<operation-blob>` as the fallback route.
//! Each hop harvests cookies, resolves conflicts, selects the next node,
//! writes cookies and answers with one of the response classes: continue,
//! complete, warning, or the malformed page when the blob is corrupt.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::error::HandlerError;
use crate::operation::{ContextError, OperationContext};
use crate::pages::{html_response, js_response, PageModel};
use crate::request::RequestInfo;
use crate::Services;

/// Handles one hop of a storage operation.
pub async fn handle_store(State(services): State<Arc<Services>>, req: Request) -> Response {
    let info = RequestInfo::from_request(&req);

    let mut ctx = match OperationContext::from_request(services.clone(), info) {
        Ok(ctx) => ctx,
        Err(e) => {
            if services.config.debug {
                debug!(error = %e, "malformed storage operation");
            }
            return malformed(&services);
        }
    };

    // The browser arriving proves the previous hop served its page.
    if !ctx.op.prev_node.is_empty() {
        if let Some(prev) = services.store.get_node(&ctx.op.prev_node) {
            prev.mark_accessed();
        }
    }

    match respond(&services, &mut ctx) {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

fn respond(
    services: &Arc<Services>,
    ctx: &mut OperationContext,
) -> Result<Response, HandlerError> {
    if let Err(e) = ctx.select_next_node() {
        return Err(match e {
            ContextError::NoHomeNode | ContextError::NoNextNode => HandlerError::NoNextNode,
            other => HandlerError::Internal(other.to_string()),
        });
    }

    // Commit this node's copy before responding, whatever class goes out.
    let cookies = match ctx.cookie_headers() {
        Ok(cookies) => cookies,
        Err(e) => {
            if services.config.debug {
                debug!(error = %e, "cookie write failed");
            }
            Vec::new()
        }
    };

    // Home-only fast path: first hop, the caller allows it, and this
    // node's cookies are complete and fresh.
    if ctx.op.nodes_visited == 1 && ctx.op.html.use_home_node && ctx.cookies_valid() {
        return complete(services, ctx, cookies);
    }

    if ctx.done() {
        if ctx.op.node_count > 1 && !ctx.op.html.java_script && !ctx.request.has_cookies() {
            return warning(services, ctx, cookies);
        }
        return complete(services, ctx, cookies);
    }

    continue_bounce(services, ctx, cookies)
}

/// Continue: send the browser to the next node, warming its DNS when the
/// next node has not been visited yet.
fn continue_bounce(
    services: &Arc<Services>,
    ctx: &mut OperationContext,
    cookies: Vec<String>,
) -> Result<Response, HandlerError> {
    let next_url = ctx.next_url().map_err(internal)?;

    let mut extra: Vec<(&'static str, String)> = Vec::new();
    let home = ctx.home_node().map_err(internal)?;
    if let Some(next) = &ctx.next_node {
        if next.domain() != home.domain() {
            extra.push((
                "link",
                format!(
                    "<{}://{}>; rel=preconnect;",
                    services.config.scheme,
                    next.domain()
                ),
            ));
        }
    }

    if ctx.op.html.java_script {
        let body = format!(
            "var s=document.createElement('script');s.src='{}';document.head.appendChild(s);",
            next_url
        );
        return js_response(StatusCode::OK, &body, &cookies, &extra);
    }

    let model = page_model(services, ctx, next_url);
    let body = if ctx.op.html.display_user_interface {
        services.pages.progress(&model)
    } else {
        services.pages.blank(&model)
    };
    html_response(StatusCode::OK, &body, &cookies, &extra)
}

/// Complete: hand the sealed results back to the caller, by post-message,
/// JavaScript callback or navigation to the return URL.
fn complete(
    services: &Arc<Services>,
    ctx: &mut OperationContext,
    cookies: Vec<String>,
) -> Result<Response, HandlerError> {
    if ctx.op.html.post_message_on_complete {
        let mut model = page_model(services, ctx, String::new());
        model.results = ctx.results().map_err(internal)?;
        model.return_url = ctx.op.return_url.clone();
        let body = services.pages.post_message(&model);
        return html_response(StatusCode::OK, &body, &cookies, &[]);
    }

    let destination = ctx.return_url_with_results().map_err(internal)?;

    if ctx.op.html.java_script {
        let body = format!("{}Complete('{}');", ctx.table, destination);
        return js_response(StatusCode::OK, &body, &cookies, &[]);
    }

    let model = page_model(services, ctx, destination);
    let body = if ctx.op.html.display_user_interface && ctx.op.nodes_visited > 1 {
        services.pages.progress(&model)
    } else {
        services.pages.blank(&model)
    };
    html_response(StatusCode::OK, &body, &cookies, &[])
}

/// Warning: the browser reached the end of the bounce without presenting
/// any cookie. Restart the operation at the home node behind a page that
/// tells the user to enable cookies.
fn warning(
    services: &Arc<Services>,
    ctx: &mut OperationContext,
    cookies: Vec<String>,
) -> Result<Response, HandlerError> {
    ctx.reset_for_warning().map_err(internal)?;
    let retry_url = ctx.next_url().map_err(internal)?;
    let model = page_model(services, ctx, retry_url);
    let body = services.pages.warning(&model);
    html_response(StatusCode::OK, &body, &cookies, &[])
}

/// The operation blob was corrupt. Send a styled page so the browser
/// still shows something sensible; the caller must restart.
pub(crate) fn malformed(services: &Arc<Services>) -> Response {
    let model = PageModel {
        background_color: services.config.background_color.clone(),
        message_color: services.config.message_color.clone(),
        ..Default::default()
    };
    let body = services.pages.malformed(&model);
    match html_response(StatusCode::OK, &body, &[], &[]) {
        Ok(r) => r,
        Err(e) => e.into_response(),
    }
}

fn page_model(services: &Arc<Services>, ctx: &OperationContext, next_url: String) -> PageModel {
    PageModel {
        title: ctx.op.html.title.clone(),
        message: ctx.op.html.message.clone(),
        background_color: ctx.op.html.background_color.clone(),
        message_color: ctx.op.html.message_color.clone(),
        progress_color: ctx.op.html.progress_color.clone(),
        percentage: ctx.op.percentage_complete(),
        next_url,
        return_url: String::new(),
        results: String::new(),
        language: ctx.request.language.clone(),
    }
    .with_defaults(services)
}

impl PageModel {
    fn with_defaults(mut self, services: &Arc<Services>) -> Self {
        if self.title.is_empty() {
            self.title = services.config.title.clone();
        }
        if self.message.is_empty() {
            self.message = services.config.message.clone();
        }
        if self.background_color.is_empty() {
            self.background_color = services.config.background_color.clone();
        }
        if self.message_color.is_empty() {
            self.message_color = services.config.message_color.clone();
        }
        if self.progress_color.is_empty() {
            self.progress_color = services.config.progress_color.clone();
        }
        self
    }
}

fn internal(e: ContextError) -> HandlerError {
    HandlerError::Internal(e.to_string())
}
