use httpmock::MockServer;

/// Starts an isolated mock Identity Toolkit server.
pub fn start_mock_server() -> MockServer {
    MockServer::start()
}

/// Base URL to hand to `with_identity_toolkit_endpoint` for `server`.
pub fn identity_toolkit_endpoint(server: &MockServer) -> String {
    server.url("/v1")
}
