use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() {
	let mut opts;

	/* Parse console input */
	let parsed_options = {
		let args: Vec<String> = std::env::args().collect();

		opts = getopts::Options::new();
		opts.optflag( "h", "help",      "Show help");
		opts.optflag( "v", "verbose",   "Increased vebosity");
		opts.optopt(  "c", "config",    "Read settings from FILE instead of the user config", "FILE");
		opts.optopt(  "s", "snapshot",  "Use a saved snapshot instead of scanning", "FILE");
		opts.optopt(  "p", "policy",    "Coverage policy: minimal-entries or minimal-depth", "POLICY");
		opts.optopt(  "o", "order",     "Order: specific-first, general-first, keep-current or alphabetical", "ORDER");
		opts.optopt(  "a", "actions",   "Comma separated actions: sort,add,remove,resolve,rename", "LIST");
		opts.optflag( "",  "no-search", "Do not search the disk for unresolved includes");
		opts.optmulti("I", "include",   "Search root used when scanning", "DIR");
		opts.parsing_style(getopts::ParsingStyle::FloatingFrees);

		let parsed_options = match opts.parse(&args[1..]) {
			Ok(m)  => { m }
			Err(e) => { println!("Unable to parse options: {}", e); return }
		};

		if parsed_options.opt_present("h") || parsed_options.free.is_empty() {
			eprintln!("{}", opts.usage("Usage: incorg organize <request.json> | scan <out> <root>... | weight <snapshot> <file>..."));
			return;
		}

		parsed_options
	};

	let default_filter = if parsed_options.opt_present("v") { "debug" } else { "warn" };
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

	let result = match parsed_options.free[0].as_str() {
		"organize" => organize(&parsed_options).await,
		"scan" => scan(&parsed_options),
		"weight" => weight(&parsed_options),
		other => Err(Error::UnknownCommand(other.to_string())),
	};

	if let Err(e) = result {
		log::error!("{}", e);
		std::process::exit(1);
	}
}

fn load_settings(options: &getopts::Matches) -> Result<incorg::Settings, Error> {
	let config = match options.opt_str("c") {
		Some(path) => incorg::Config::load_from_file(path)?,
		None => incorg::Config::load_from_disk().unwrap_or_else(|e| {
			log::warn!("Failed to read config file: {}", e);
			log::warn!("Using default config.");
			incorg::Config::default()
		}),
	};

	let mut settings = config.settings;
	if let Some(policy) = options.opt_str("p") {
		settings.policy = policy.parse()?;
	}
	if let Some(order) = options.opt_str("o") {
		settings.order = order.parse()?;
	}
	if let Some(actions) = options.opt_str("a") {
		settings.organize_actions = actions.parse()?;
	}
	if options.opt_present("no-search") {
		settings.search_unresolved = false;
	}
	Ok(settings)
}

async fn organize(options: &getopts::Matches) -> Result<(), Error> {
	let request_path = options.free.get(1).ok_or(Error::MissingArgument("request file"))?;
	let request = incorg::OrganizeRequest::load_from_file(request_path)?;
	let settings = load_settings(options)?;

	let snapshot = match options.opt_str("s") {
		Some(path) => incorg::DependencySnapshot::load_from_file(path)?,
		None => {
			log::info!("No snapshot given, scanning {}", request.project_root.display());
			incorg::DependencySnapshot::scan(&[request.project_root.clone()], &request.search_roots)?
		},
	};

	let organizer = Arc::new(incorg::Organizer::new(Arc::new(incorg::DependencyIndex::new(snapshot)), settings));
	let result = incorg::organize_in_background(organizer, request).await?;

	print!("{}", result.render());
	for entry in &result.dropped {
		eprintln!("dropped: {}", entry.directive());
	}
	for entry in &result.unresolved {
		eprintln!("unresolved: {}", entry.directive());
	}
	for file in &result.uncoverable {
		eprintln!("uncoverable: {}", file);
	}
	Ok(())
}

fn scan(options: &getopts::Matches) -> Result<(), Error> {
	let out = options.free.get(1).ok_or(Error::MissingArgument("output file"))?;
	let roots: Vec<PathBuf> = options.free[2..].iter().map(PathBuf::from).collect();
	if roots.is_empty() {
		return Err(Error::MissingArgument("root directory"));
	}
	let search_roots: Vec<PathBuf> = options.opt_strs("I").into_iter().map(PathBuf::from).collect();

	let snapshot = incorg::DependencySnapshot::scan(&roots, &search_roots)?;
	snapshot.save_to_file(out)?;
	println!("Saved {} files to {}", snapshot.len(), out);
	Ok(())
}

fn weight(options: &getopts::Matches) -> Result<(), Error> {
	let path = options.free.get(1).ok_or(Error::MissingArgument("snapshot file"))?;
	let files = &options.free[2..];
	if files.is_empty() {
		return Err(Error::MissingArgument("file"));
	}

	let index = incorg::DependencyIndex::new(incorg::DependencySnapshot::load_from_file(path)?);
	for file in files {
		println!("{}", index.weight_report(&incorg::FilePath::from_path(file)));
	}
	Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("incorg error: {0}")]
	Incorg(#[from] incorg::Error),
	#[error("Missing argument: {0}")]
	MissingArgument(&'static str),
	#[error("Unknown command `{0}`")]
	UnknownCommand(String),
}
