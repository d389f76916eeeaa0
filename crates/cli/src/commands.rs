use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{error, info};

use citizen_core::{
    outcome_message, AccountManager, CountryId, FileStore, GameSettings, ItemType, MarketError,
    Offer, OfferEdit, OfferId, OfferListing, OfferManager, UserId,
};

/// Player marketplace and energy tools.
#[derive(Debug, Parser)]
#[command(name = "citizen", version)]
pub struct Cli {
    /// Account acting for this command.
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Override the data directory from the configuration.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a new account.
    Register {
        id: String,
        name: String,
        #[arg(long, default_value_t = 1)]
        country: u32,
    },
    /// Show the acting user's profile.
    Profile,
    /// Item kinds that can be listed.
    Items,
    /// The acting user's own offers.
    List,
    /// All offers for an item kind, cheapest first.
    Browse { item: ItemType },
    /// Details of a single offer.
    Show { id: OfferId },
    /// List goods for sale.
    Add {
        item: ItemType,
        amount: u32,
        price: Decimal,
    },
    /// Edit one of the acting user's offers.
    Edit {
        id: OfferId,
        /// Version shown by `show`; the edit fails if the offer changed since.
        #[arg(long)]
        expected_version: u64,
        #[arg(long)]
        item: Option<ItemType>,
        #[arg(long)]
        amount: Option<u32>,
        #[arg(long)]
        price: Option<Decimal>,
    },
    /// Remove one of the acting user's offers.
    Delete {
        id: OfferId,
        /// Succeed quietly if the offer is already gone.
        #[arg(long)]
        ignore_missing: bool,
    },
    /// Spend energy.
    Spend { amount: u32 },
    /// Eat food to restore energy.
    Eat { units: u32 },
    /// Move to another country.
    MoveCountry { country: u32 },
    /// Apply regeneration ticks to every account once.
    Tick { ticks: u64 },
    /// Drive regeneration on a timer.
    Regen {
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        #[arg(long, default_value_t = 10)]
        rounds: u32,
    },
}

pub async fn run(cli: Cli, store: Arc<FileStore>, settings: GameSettings) -> Result<()> {
    let market = OfferManager::new(Arc::clone(&store));
    let accounts = AccountManager::new(store, settings);
    let acting = cli.user.map(UserId::new);

    match cli.command {
        Command::Register { id, name, country } => {
            let account = accounts.register(UserId::new(id), &name, CountryId(country))?;
            println!(
                "Registered {} ({}) with {} money and {} energy",
                account.name, account.id, account.money, account.energy
            );
        }
        Command::Profile => {
            let profile = accounts.profile(require_user(&acting)?)?;
            println!("{} ({})", profile.name, profile.id);
            println!("  money:          {}", profile.money);
            println!("  energy:         {}", profile.energy);
            println!("  energy restore: {}", profile.energy_restore);
            println!("  country:        {}", profile.country_id);
        }
        Command::Items => {
            for item in ItemType::known() {
                println!("{item}");
            }
        }
        Command::List => {
            let offers = market.list_offers_for_user(require_user(&acting)?)?;
            if offers.is_empty() {
                println!("No offers listed.");
            }
            for offer in &offers {
                print_offer(offer);
            }
        }
        Command::Browse { item } => {
            let listings = market.list_offers_by_item_type(&item)?;
            if listings.is_empty() {
                println!("No {item} offers.");
            }
            for listing in &listings {
                print_listing(listing);
            }
        }
        Command::Show { id } => {
            let listing = market.get_offer(id)?;
            print_listing(&listing);
            println!(
                "  listed {} · updated {}",
                listing.offer.listed_at.format("%Y-%m-%d %H:%M"),
                listing.offer.updated_at.format("%Y-%m-%d %H:%M")
            );
        }
        Command::Add {
            item,
            amount,
            price,
        } => {
            let offer = market.create_offer(require_user(&acting)?, item, amount, price)?;
            print_offer(&offer);
        }
        Command::Edit {
            id,
            expected_version,
            item,
            amount,
            price,
        } => {
            let owner = require_user(&acting)?;
            let current = market.get_offer(id)?.offer;
            let edit = OfferEdit {
                expected_version,
                item_type: item.unwrap_or(current.item_type),
                amount: amount.unwrap_or(current.amount),
                price: price.unwrap_or(current.price),
            };
            let result = market.update_offer(id, owner, edit);
            let message = outcome_message(&result);
            let offer = result?;
            println!("{message}");
            print_offer(&offer);
        }
        Command::Delete { id, ignore_missing } => {
            match market.delete_offer(id, require_user(&acting)?) {
                Ok(()) => println!("Offer #{id} removed."),
                Err(err) if ignore_missing && err.is_not_found() => {
                    println!("Offer #{id} is already gone.");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Command::Spend { amount } => {
            let account = accounts.spend_energy(require_user(&acting)?, amount)?;
            println!("Energy left: {}", account.energy);
        }
        Command::Eat { units } => {
            let (account, gained) = accounts.eat_food(require_user(&acting)?, units)?;
            println!("Gained {gained} energy, now {}", account.energy);
        }
        Command::MoveCountry { country } => {
            let account = accounts.change_country(require_user(&acting)?, CountryId(country))?;
            println!(
                "Now in country {} with {} money",
                account.country_id, account.money
            );
        }
        Command::Tick { ticks } => {
            let changed = accounts.accrue_all(ticks)?;
            println!("Regenerated {changed} account(s).");
        }
        Command::Regen {
            interval_ms,
            rounds,
        } => regen(accounts, interval_ms, rounds).await?,
    }

    Ok(())
}

async fn regen(accounts: AccountManager<FileStore>, interval_ms: u64, rounds: u32) -> Result<()> {
    let (tick_tx, mut tick_rx) = mpsc::channel::<u64>(8);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
        for _ in 0..rounds {
            interval.tick().await;
            if tick_tx.send(1).await.is_err() {
                break;
            }
        }
    });

    while let Some(ticks) = tick_rx.recv().await {
        // Each accrual rewrites the snapshot on disk.
        let round = accounts.clone();
        match tokio::task::spawn_blocking(move || round.accrue_all(ticks)).await? {
            Ok(changed) => info!(ticks, changed, "Regeneration round applied"),
            Err(err @ MarketError::Store(_)) => return Err(err.into()),
            Err(err) => error!(?err, "Regeneration round failed"),
        }
    }
    println!("Regeneration finished after {rounds} round(s).");
    Ok(())
}

fn require_user(acting: &Option<UserId>) -> Result<&UserId> {
    acting
        .as_ref()
        .ok_or_else(|| anyhow!("--user is required for this command"))
}

fn print_offer(offer: &Offer) {
    println!(
        "#{:<5} {:<8} x{:<6} @ {:>10}  (v{})",
        offer.id, offer.item_type, offer.amount, offer.price, offer.version
    );
}

fn print_listing(listing: &OfferListing) {
    print_offer(&listing.offer);
    println!("       sold by {} ({})", listing.owner.name, listing.owner.id);
}
