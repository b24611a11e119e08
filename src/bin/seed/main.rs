use anyhow::Context;
use campus_eats::{config::Config, db, seed::SeedFixture, service::RestaurantService};

const USAGE: &str = "Usage: seed [--reset | --count]

  (no flag)  load the fixture into an empty restaurant collection
  --reset    drop every restaurant and reload the fixture
  --count    print the number of stored restaurants";

enum Action {
    Ensure,
    Reset,
    Count,
}

impl Action {
    fn new(args: &[String]) -> Result<Self, String> {
        match args {
            [] => Ok(Self::Ensure),
            [flag] if flag == "--reset" => Ok(Self::Reset),
            [flag] if flag == "--count" => Ok(Self::Count),
            [flag] if flag == "--help" || flag == "-h" => Err(String::new()),
            _ => Err(format!("unexpected argument {:?}", args.join(" "))),
        }
    }

    // consumed the action
    async fn run(
        self,
        restaurants: &RestaurantService,
        store: &db::RestaurantStore,
    ) -> anyhow::Result<()> {
        match self {
            Self::Ensure => {
                let report = restaurants.ensure_seeded().await?;
                if report.seeded {
                    tracing::info!("seeded {} restaurants", report.count);
                } else {
                    tracing::info!("{} restaurants already stored, nothing to do", report.count);
                }
            }
            Self::Reset => {
                restaurants.reset_to_seed().await?;
                tracing::info!("restaurants reset, {} stored", store.count().await?);
            }
            Self::Count => println!("{}", store.count().await?),
        }

        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(true)
        .with_file(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("fail to setup logging")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let action = match Action::new(&args) {
        Ok(action) => action,
        Err(hint) if hint.is_empty() => {
            println!("{USAGE}");
            return Ok(());
        }
        Err(hint) => anyhow::bail!("{hint}\n\n{USAGE}"),
    };

    let config = Config::from_env()?;
    let pool = db::connect(&config.database_url, &config.pool_settings())
        .await
        .with_context(|| format!("fail to open database {}", config.database_url))?;
    let store = db::RestaurantStore::new(pool.clone());
    let fixture = SeedFixture::new(config.seed_path.clone());
    tracing::info!("using fixture {}", fixture.path().display());
    let restaurants = RestaurantService::new(store.clone(), fixture);

    let result = action.run(&restaurants, &store).await;
    pool.close().await;
    result
}
