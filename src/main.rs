use iced::widget::{button, column, container, row, text};
use iced::{Element, Length, Task, Theme};
use log::info;
use thiserror::Error;

mod config;
mod media;
mod publish;
mod state;
mod ui;

use config::{Config, ConfigError};
use publish::Publisher;
use state::catalog::PhotoCatalog;
use state::records::{RecordStore, StoreError};
use ui::{address, photos, Tab};

/// Failures that stop the application before the window opens
#[derive(Debug, Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("address database: {0}")]
    Store(#[from] StoreError),
    #[error("window: {0}")]
    Ui(#[from] iced::Error),
}

/// Main application state
struct AddressManager {
    tab: Tab,
    addresses: address::AddressTab,
    photos: photos::PhotoTab,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    TabSelected(Tab),
    Address(address::Message),
    Photos(photos::Message),
}

impl AddressManager {
    fn new(config: Config, store: RecordStore) -> Self {
        let catalog = PhotoCatalog::new(
            config.project_dir.clone(),
            config.catalog_path(),
            config.images_path(),
        );
        let publisher = Publisher::from_config(&config);

        AddressManager {
            tab: Tab::Addresses,
            addresses: address::AddressTab::new(store),
            photos: photos::PhotoTab::new(catalog, publisher, config.normalize),
        }
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::TabSelected(tab) => {
                self.tab = tab;
                Task::none()
            }
            Message::Address(message) => self.addresses.update(message).map(Message::Address),
            Message::Photos(message) => self.photos.update(message).map(Message::Photos),
        }
    }

    fn view(&self) -> Element<'_, Message> {
        let tabs = row![
            tab_button("Addresses", Tab::Addresses, self.tab),
            tab_button("Photos", Tab::Photos, self.tab),
        ]
        .spacing(8);

        let page = match self.tab {
            Tab::Addresses => self.addresses.view().map(Message::Address),
            Tab::Photos => self.photos.view().map(Message::Photos),
        };

        container(column![tabs, page].spacing(12).padding(10))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

fn tab_button(label: &str, tab: Tab, current: Tab) -> Element<'_, Message> {
    let style: fn(&Theme, button::Status) -> button::Style = if tab == current {
        button::primary
    } else {
        button::secondary
    };
    button(text(label))
        .style(style)
        .on_press(Message::TabSelected(tab))
        .padding(8)
        .into()
}

fn main() -> Result<(), StartupError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::discover()?;
    let database = config.database_path();
    let store = RecordStore::open(&database)?;
    info!(
        "Address manager starting in {} with database {}",
        config.project_dir.display(),
        database.display()
    );

    iced::application(
        "Address & Photo Manager",
        AddressManager::update,
        AddressManager::view,
    )
    .theme(AddressManager::theme)
    .centered()
    .run_with(move || (AddressManager::new(config, store), Task::none()))?;

    Ok(())
}
