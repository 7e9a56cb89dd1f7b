use anyhow::{Context, Result, bail};
use clap::Parser;
use routemap::model::{Endpoint, FrameworkType};
use routemap::{cleaner, cli, database, extractors, source_root};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Args::parse_from(cli::normalize_args(std::env::args()));

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(framework) = FrameworkType::from_name(&args.framework) else {
        bail!(
            "unknown framework '{}' (expected jsp, spring, rails, django, mvc, webforms, struts or detect)",
            args.framework
        );
    };

    let targets = gather_targets(&args)?;
    if targets.is_empty() {
        bail!("no target given; pass a directory or --path-list-file");
    }

    for target in targets {
        run_target(&target, framework, &args)?;
    }
    Ok(())
}

fn gather_targets(args: &cli::Args) -> Result<Vec<PathBuf>> {
    let mut targets = Vec::new();
    if let Some(target) = &args.target {
        targets.push(target.clone());
    }
    if let Some(list_file) = &args.path_list_file {
        let content = routemap::util::read_to_string(list_file)?;
        for line in content.lines() {
            let entry = line.split('#').next().unwrap_or("").trim();
            if entry.is_empty() {
                continue;
            }
            let path = PathBuf::from(entry);
            if path.exists() {
                targets.push(path);
            } else {
                warn!(entry, "path list entry does not exist, skipping");
            }
        }
    }
    Ok(targets)
}

fn run_target(target: &PathBuf, framework: FrameworkType, args: &cli::Args) -> Result<()> {
    let root = source_root::materialize(target)
        .with_context(|| format!("materialize {}", target.display()))?;
    let endpoints = extractors::extract(root.path(), framework);
    let database = database::EndpointDatabase::new(
        framework,
        endpoints,
        &cleaner::PathCleaner::new(Vec::new()),
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(database.endpoints())?);
        return Ok(());
    }

    if args.simple {
        for endpoint in database.endpoints() {
            println!("{} {}", endpoint.http_method, endpoint.url_path);
            for variant in &endpoint.variants {
                println!("{} {}", variant.http_method, variant.url_path);
            }
        }
        return Ok(());
    }

    println!("{} endpoints found in {}", database.endpoints().len(), target.display());
    for endpoint in database.endpoints() {
        print_endpoint(endpoint, args.lint, 0);
    }
    print_statistics(database.endpoints());
    Ok(())
}

fn print_endpoint(endpoint: &Endpoint, lint: bool, indent: usize) {
    let pad = " ".repeat(indent);
    println!(
        "{pad}{} {} -> {}:{}-{}",
        endpoint.http_method,
        endpoint.url_path,
        endpoint.file_path,
        endpoint.start_line,
        endpoint.end_line
    );
    if lint {
        for parameter in endpoint.parameters.values() {
            println!(
                "{pad}    param {} type={:?} kind={:?} optional={}",
                parameter.name, parameter.data_type, parameter.param_type, parameter.optional
            );
        }
        for variant in &endpoint.variants {
            print_endpoint(variant, lint, indent + 2);
        }
    }
}

fn print_statistics(endpoints: &[Endpoint]) {
    let mut optional = 0usize;
    let mut with_accepted_values = 0usize;
    let mut by_data_type: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_param_type: BTreeMap<String, usize> = BTreeMap::new();

    let mut stack: Vec<&Endpoint> = endpoints.iter().collect();
    while let Some(endpoint) = stack.pop() {
        for parameter in endpoint.parameters.values() {
            if parameter.optional {
                optional += 1;
            }
            if parameter.accepted_values.is_some() {
                with_accepted_values += 1;
            }
            *by_data_type
                .entry(format!("{:?}", parameter.data_type))
                .or_default() += 1;
            *by_param_type
                .entry(format!("{:?}", parameter.param_type))
                .or_default() += 1;
        }
        stack.extend(endpoint.variants.iter());
    }

    println!("optional parameters: {optional}");
    println!("parameters with accepted values: {with_accepted_values}");
    for (data_type, count) in &by_data_type {
        println!("data type {data_type}: {count}");
    }
    for (param_type, count) in &by_param_type {
        println!("param kind {param_type}: {count}");
    }
}
