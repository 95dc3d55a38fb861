use std::io::Read;

use tangem_sdk::{CardSession, JsonRpcLinker};
use tracing::debug;

/// Answer a JSON-RPC request, or a batch, from the argument or stdin
pub fn jsonrpc_command(session: &mut CardSession, request: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let request = match request {
        Some(request) => request,
        None => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            input
        }
    };
    debug!("JSON-RPC request: {}", request);

    let response = JsonRpcLinker::new(session).handle(&request);
    println!("{}", response);
    Ok(())
}
