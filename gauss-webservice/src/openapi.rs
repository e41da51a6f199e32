use crate::{handler, model};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::health_check,
        handler::solve_handler,
        handler::solve_sequential_handler,
    ),
    components(
        schemas(
            model::SolveRequest,
            model::SolveResponse,
            model::ErrorResponse
        )
    ),
    tags(
        (name = "Gauss Webservice", description = "Dense linear system solving by Gaussian elimination")
    ),
    info(
        title = "Gauss Webservice API",
        version = "0.1.0",
        description = "Solves augmented systems [A | b] with a multi-process elimination engine, \
                       cross-checked against a sequential reference engine.",
        license(
            name = "MIT/Apache-2.0",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
