use std::{env, fs};

use graph_value::GraphValue;
use query_compiler::{BoxError, CallbackRegistry, CompileContext, CreateStrategy};
use schema_model::{SchemaDefinition, SchemaModel, Selection};
use serde_json::json;
use tracing_subscriber::EnvFilter;

pub fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let definition: SchemaDefinition = serde_json::from_str(include_str!("./schema.json"))?;
    let schema = SchemaModel::build(definition)?;

    // movies(where: { title_STARTS_WITH: "The" }, options: { sort: [{ released: DESC }] }) {
    //     title
    //     actorsConnection(first: 2) { totalCount edges { role node { name } } }
    // }
    let request = match env::args().nth(1) {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => json!({
            "name": "movies",
            "arguments": {
                "where": { "title_STARTS_WITH": "The" },
                "options": { "sort": [{ "released": "DESC" }] }
            },
            "selection": [
                { "name": "title" },
                {
                    "name": "actorsConnection",
                    "arguments": { "first": 2 },
                    "selection": [
                        { "name": "totalCount" },
                        {
                            "name": "edges",
                            "selection": [
                                { "name": "role" },
                                { "name": "node", "selection": [{ "name": "name" }] }
                            ]
                        }
                    ]
                }
            ]
        }),
    };

    let selection: Selection = serde_json::from_value(request)?;

    let strategy = match env::var("CREATE_STRATEGY").as_deref() {
        Ok("per-row") => CreateStrategy::PerRow,
        Ok("batched") | Err(_) => CreateStrategy::Batched,
        Ok(other) => anyhow::bail!("unknown create strategy `{other}`"),
    };

    let jwt = match env::var("JWT_CLAIMS") {
        Ok(claims) => Some(claims.parse::<GraphValue>()?),
        Err(_) => None,
    };

    let context = CompileContext::builder()
        .maybe_jwt(jwt)
        .subscriptions_enabled(env::var_os("SUBSCRIPTIONS").is_some())
        .create_strategy(strategy)
        .callbacks(CallbackRegistry::new().register("uuid", |parent: GraphValue| async move {
            let title = parent.get("title").and_then(GraphValue::as_str).unwrap_or("untitled");
            Ok::<_, BoxError>(GraphValue::from(format!("playground-{}", title.to_lowercase().replace(' ', "-"))))
        }))
        .build();

    tracing::info!(root = %selection.name, ?strategy, "compiling");

    let query = futures::executor::block_on(query_compiler::compile_with_fallback(&schema, &selection, &context))?;

    println!("{}", query.text);
    println!();
    println!("{}", serde_json::to_string_pretty(&query.params)?);

    Ok(())
}
