//! Turns declared controllers into registered routes.

use {
    crate::{
        Error, Result,
        container::{Container, Dependency},
        metadata::{ParamDescriptor, Registry},
        path,
        pipeline::executor::CompiledRoute,
        transport::{RouteHandler, RouteTable},
    },
    futures_util::FutureExt,
    std::sync::Arc,
};

/// Compiles every route of `controllers` into `table`.
///
/// Controllers are resolved through `container` first; a resolution failure
/// aborts compilation. Routes are registered controller by controller in
/// declaration order. Returns the number of routes registered.
pub fn compile(
    registry: &Registry,
    container: &Container,
    controllers: &[Dependency],
    global_prefix: &str,
    table: &mut RouteTable,
) -> Result<usize> {
    let mut count = 0;

    for controller in controllers {
        let instance = container.resolve_erased(controller)?;
        let type_id = controller.type_id();
        let prefix = registry.prefix(type_id);

        for route in registry.routes(type_id) {
            let full_path = path::join(global_prefix, prefix, &route.path);
            let label = format!("{} {}", route.method, full_path);

            let handler = registry
                .handler(type_id, &route.handler_name)
                .cloned()
                .ok_or_else(|| {
                    Error::internal(format!(
                        "No handler bound to {}::{}",
                        controller.type_name(),
                        route.handler_name
                    ))
                })?;
            let params = sorted_params(registry.params(type_id, &route.handler_name), &label)?;

            let compiled = Arc::new(CompiledRoute::new(
                label,
                Arc::clone(&instance),
                handler,
                params,
                registry.guards(type_id, &route.handler_name).to_vec(),
                registry.pipes(type_id, &route.handler_name).to_vec(),
                registry.filters(type_id, &route.handler_name).to_vec(),
            ));
            tracing::info!(
                route = %compiled.label(),
                controller = controller.type_name(),
                handler = %route.handler_name,
                "Mapped route"
            );

            let route_handler: RouteHandler =
                Arc::new(move |request| Arc::clone(&compiled).handle(request).boxed());
            table.register(
                route.method,
                &full_path,
                registry
                    .middleware(type_id, &route.handler_name)
                    .to_vec(),
                route_handler,
            );
            count += 1;
        }
    }

    Ok(count)
}

/// Highest parameter index a handler may declare.
pub const MAX_PARAM_INDEX: usize = 255;

/// Orders parameters by index and rejects duplicate or out-of-range indices.
fn sorted_params(params: &[ParamDescriptor], label: &str) -> Result<Vec<ParamDescriptor>> {
    let mut sorted = params.to_vec();
    sorted.sort_by_key(|p| p.index);

    if let Some(last) = sorted.last().filter(|p| p.index > MAX_PARAM_INDEX) {
        return Err(Error::invalid_input(format!(
            "Route {label} declares parameter index {}, the limit is {MAX_PARAM_INDEX}",
            last.index
        )));
    }

    if let Some(pair) = sorted.windows(2).find(|pair| pair[0].index == pair[1].index) {
        return Err(Error::invalid_input(format!(
            "Route {label} declares parameter index {} more than once",
            pair[0].index
        )));
    }
    Ok(sorted)
}
