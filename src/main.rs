use clap::{Parser, Subcommand, ValueEnum};
use groundwork::cache::{CachePolicy, CacheStats, Clock, ResponseCache, SystemClock};
use groundwork::config::{self, SiteConfig};
use groundwork::fetch::{CachedFetcher, FetchEvent};
use groundwork::locale::Locale;
use groundwork::output;
use groundwork::pages::PageLoader;
use groundwork::query::{FieldPath, FieldShape, localized_field};
use groundwork::store::{self, ContentStore};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::JoinHandle;

/// Shared flags for commands that fetch content.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Bypass the response cache: every query goes to the CMS
    #[arg(long)]
    no_cache: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PageArg {
    Home,
    Services,
    Contact,
    Blog,
    Post,
    Properties,
    Property,
}

#[derive(Parser)]
#[command(name = "groundwork")]
#[command(about = "Locale-aware content resolution for the company website")]
#[command(long_about = "\
Locale-aware content resolution for the company website

Copy is stored in the CMS as per-locale maps. Every page is resolved for one
locale, falling back to the default locale where a translation is missing,
and to hardcoded copy where the CMS has nothing or cannot be reached.

Responses are cached in the cache directory (see [cache] in groundwork.toml)
and tagged by page and locale, e.g. 'home' or 'locale:de'.

Run 'groundwork gen-config' to generate a documented groundwork.toml.")]
#[command(version)]
struct Cli {
    /// Directory containing groundwork.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the query expression selecting a localized field
    Query {
        /// Dotted field path, e.g. `title` or `hero.title`
        #[arg(long)]
        field: String,
        /// scalar, nested or array
        #[arg(long, default_value = "scalar")]
        shape: FieldShape,
        #[arg(long)]
        locale: String,
    },
    /// Load one page record and print it as JSON
    Fetch {
        #[arg(value_enum)]
        page: PageArg,
        #[arg(long)]
        locale: String,
        /// Document slug (required for `post` and `property`)
        #[arg(long)]
        slug: Option<String>,
        #[command(flatten)]
        cache: CacheArgs,
    },
    /// Load every page for a locale to warm the cache
    Prefetch {
        #[arg(long)]
        locale: String,
        #[command(flatten)]
        cache: CacheArgs,
    },
    /// Drop cached responses by tag
    Invalidate {
        /// Tag to invalidate (repeatable), e.g. `home` or `locale:de`
        #[arg(long = "tag", required_unless_present = "all")]
        tags: Vec<String>,
        /// Drop the whole cache
        #[arg(long)]
        all: bool,
    },
    /// Validate groundwork.toml without fetching
    Check,
    /// Print a stock groundwork.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Query {
            field,
            shape,
            locale,
        } => {
            let config = config::load_config(&cli.config_dir)?;
            let settings = config.locale_settings();
            let locale = settings.negotiate(&locale)?;
            let path = FieldPath::parse(&field)?;
            let expression = localized_field(&path, shape, &locale, &settings);
            output::print_lines(&output::format_query(&field, locale.as_str(), &expression));
        }
        Command::Fetch {
            page,
            locale,
            slug,
            cache,
        } => {
            let request = PageRequest::new(page, slug)?;
            let config = config::load_config(&cli.config_dir)?;
            let settings = config.locale_settings();
            let locale = settings.negotiate(&locale)?;
            let session = Session::open(&cli.config_dir, &config)?;
            let loader =
                PageLoader::new(&session.fetcher, &settings).policy(page_policy(&config, &cache));
            let json = request.render(&loader, &locale);
            let stats = session.close()?;
            println!("{}", json?);
            println!("Cache: {}", stats);
        }
        Command::Prefetch { locale, cache } => {
            let config = config::load_config(&cli.config_dir)?;
            let settings = config.locale_settings();
            let locale = settings.negotiate(&locale)?;
            let session = Session::open(&cli.config_dir, &config)?;
            let results = PageLoader::new(&session.fetcher, &settings)
                .policy(page_policy(&config, &cache))
                .prefetch_all(&locale);
            let stats = session.close()?;
            output::print_prefetch(locale.as_str(), &results);
            println!("Cache: {}", stats);
        }
        Command::Invalidate { tags, all } => {
            let config = config::load_config(&cli.config_dir)?;
            let cache_dir = cli.config_dir.join(&config.cache.dir);
            let cache = ResponseCache::load(&cache_dir);
            if all {
                let removed = cache.len();
                cache.clear();
                println!("Removed all {} cached entries", removed);
            } else {
                for tag in tags {
                    let removed = cache.invalidate_tag(&tag);
                    let event = FetchEvent::Invalidated { tag, removed };
                    output::print_lines(&output::format_fetch_event(&event));
                }
            }
            cache.save(&cache_dir)?;
        }
        Command::Check => {
            println!("==> Checking {}", cli.config_dir.join(config::CONFIG_FILENAME).display());
            let config = config::load_config(&cli.config_dir)?;
            let settings = config.locale_settings();
            let supported: Vec<&str> = settings.supported().iter().map(|l| l.as_str()).collect();
            println!(
                "    Locales: {} (default {})",
                supported.join(", "),
                settings.default_locale()
            );
            println!("    Cache: {}", config.cache.policy());
            if config.store.project_id.is_empty() {
                println!("    Store: not configured (store.project_id is empty)");
            } else {
                println!(
                    "    Store: {}/{} (v{})",
                    config.store.project_id, config.store.dataset, config.store.api_version
                );
            }
            println!("==> Config is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// A page to fetch, with the slug already checked for pages that need one.
#[derive(Debug, PartialEq, Eq)]
enum PageRequest {
    Listing(PageArg),
    Post(String),
    Property(String),
}

impl PageRequest {
    fn new(page: PageArg, slug: Option<String>) -> Result<Self, String> {
        match (page, slug) {
            (PageArg::Post, Some(slug)) => Ok(Self::Post(slug)),
            (PageArg::Property, Some(slug)) => Ok(Self::Property(slug)),
            (PageArg::Post, None) => Err("--slug is required for `post`".into()),
            (PageArg::Property, None) => Err("--slug is required for `property`".into()),
            (page, _) => Ok(Self::Listing(page)),
        }
    }

    fn render<S: ContentStore>(
        &self,
        loader: &PageLoader<'_, S, SystemClock>,
        locale: &Locale,
    ) -> serde_json::Result<String> {
        match self {
            Self::Post(slug) => serde_json::to_string_pretty(&loader.blog_post(slug, locale)),
            Self::Property(slug) => serde_json::to_string_pretty(&loader.property(slug, locale)),
            Self::Listing(PageArg::Home) => serde_json::to_string_pretty(&loader.home(locale)),
            Self::Listing(PageArg::Services) => {
                serde_json::to_string_pretty(&loader.services(locale))
            }
            Self::Listing(PageArg::Contact) => {
                serde_json::to_string_pretty(&loader.contact(locale))
            }
            Self::Listing(PageArg::Blog) => serde_json::to_string_pretty(&loader.blog(locale)),
            Self::Listing(PageArg::Properties | PageArg::Post | PageArg::Property) => {
                serde_json::to_string_pretty(&loader.properties(locale))
            }
        }
    }
}

/// Cache policy for page loads: `--no-cache` wins over the config.
fn page_policy(config: &SiteConfig, args: &CacheArgs) -> CachePolicy {
    if args.no_cache {
        CachePolicy::NoStore
    } else {
        config.cache.policy()
    }
}

/// A fetcher backed by the on-disk cache, with events printed as they arrive.
struct Session {
    fetcher: CachedFetcher<Box<dyn ContentStore>>,
    cache_dir: PathBuf,
    printer: JoinHandle<()>,
}

impl Session {
    fn open(config_dir: &Path, config: &SiteConfig) -> Result<Self, Box<dyn std::error::Error>> {
        // Without a project every page is served from fallback copy
        let store = store::store_from_config(&config.store)?;
        let cache_dir = config_dir.join(&config.cache.dir);
        let cache = ResponseCache::load(&cache_dir);
        cache.purge_expired(SystemClock.now());

        let (tx, rx) = mpsc::channel();
        let printer = std::thread::spawn(move || {
            for event in rx {
                for line in output::format_fetch_event(&event) {
                    eprintln!("{}", line);
                }
            }
        });
        let fetcher = CachedFetcher::new(store)
            .cache(cache)
            .default_ttl(config.cache.default_ttl_secs)
            .events(tx);
        Ok(Self {
            fetcher,
            cache_dir,
            printer,
        })
    }

    /// Persist the cache and wait for pending output.
    fn close(self) -> Result<CacheStats, Box<dyn std::error::Error>> {
        self.fetcher.response_cache().save(&self.cache_dir)?;
        let stats = self.fetcher.stats();
        // Dropping the fetcher closes the event channel
        drop(self.fetcher);
        self.printer
            .join()
            .map_err(|_| "output thread panicked")?;
        Ok(stats)
    }
}
