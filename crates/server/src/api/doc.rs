//! OpenAPI documentation aggregator, served via Scalar UI at `/docs`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "agent-relay API",
        version = "0.1.0",
        description = "Relay between the dashboard and the remote agent service: submit, poll, normalize.",
    ),
    tags(
        (name = "Health", description = "Server liveness and configuration"),
        (name = "Agent", description = "Messaging the default agent and polling for replies"),
        (name = "Remix Agent", description = "Messaging named agents, remixing, waking, listing and file reads"),
    ),
    paths(
        crate::api::health::health,
        crate::api::agent::send_message,
        crate::api::agent::list_messages,
        crate::api::agent::poll,
        crate::api::remix_agent::send_message,
        crate::api::remix_agent::list_messages,
        crate::api::remix_agent::remix,
        crate::api::remix_agent::wake,
        crate::api::remix_agent::agent_state,
        crate::api::remix_agent::list_agents,
        crate::api::remix_agent::read_file,
        crate::api::remix_agent::create_session,
    ),
    components(schemas(
        crate::api::ErrorResponse,
        crate::api::health::HealthResponse,
        crate::api::agent::SendMessageRequest,
        crate::api::remix_agent::RemixMessageRequest,
        crate::api::remix_agent::RemixBody,
        crate::api::remix_agent::WakeBody,
        crate::api::remix_agent::SessionBody,
    ))
)]
pub struct ApiDoc;
