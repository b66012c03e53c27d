use iced::widget::{
    button, checkbox, column, container, pick_list, row, scrollable, text, text_input, Column,
};
use iced::{Alignment, Element, Length, Task};
use log::{error, info};
use rfd::FileDialog;
use std::collections::BTreeSet;
use std::path::Path;

use super::confirm;
use crate::state::data::{AddressField, AddressFields, AddressRecord};
use crate::state::records::RecordStore;

#[derive(Debug, Clone)]
pub enum Message {
    FieldChanged(AddressField, String),
    PickPhoto,
    Submit,
    ClearForm,
    ProvinceSelected(String),
    CitySelected(String),
    Query,
    KeywordChanged(String),
    Search,
    Toggle(i64, bool),
    DeleteSelected,
    EditSelected,
    CopySelected,
    ShowDetails(i64),
    CloseDetails,
    CopyText(String),
    ClearResults,
}

/// The query that produced the current result list, re-run after edits
#[derive(Debug, Clone)]
enum LastQuery {
    Region { province: String, city: String },
    Keyword(String),
}

/// Address book tab: entry form, region/keyword queries and the result list
pub struct AddressTab {
    store: RecordStore,
    form: AddressFields,
    /// Record being edited; `None` means the form adds a new one
    editing: Option<i64>,
    provinces: Vec<String>,
    cities: Vec<String>,
    province: Option<String>,
    city: Option<String>,
    keyword: String,
    results: Vec<AddressRecord>,
    selected: BTreeSet<i64>,
    last_query: Option<LastQuery>,
    details: Option<AddressRecord>,
    status: String,
}

impl AddressTab {
    pub fn new(store: RecordStore) -> Self {
        let count = store.count().unwrap_or(0);
        info!("Address book {} holds {} records", store.path().display(), count);
        let mut tab = AddressTab {
            store,
            form: AddressFields::default(),
            editing: None,
            provinces: Vec::new(),
            cities: Vec::new(),
            province: None,
            city: None,
            keyword: String::new(),
            results: Vec::new(),
            selected: BTreeSet::new(),
            last_query: None,
            details: None,
            status: format!("Ready. {} addresses in the book.", count),
        };
        tab.reload_provinces();
        tab
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::FieldChanged(field, value) => {
                *self.form.get_mut(field) = value;
            }
            Message::PickPhoto => {
                let picked = FileDialog::new()
                    .set_title("Select a photo")
                    .add_filter("Image files", &["jpg", "jpeg", "png", "gif"])
                    .add_filter("All files", &["*"])
                    .pick_file();
                if let Some(path) = picked {
                    self.form.photo_path = path.to_string_lossy().to_string();
                }
            }
            Message::Submit => self.submit(),
            Message::ClearForm => {
                self.form = AddressFields::default();
                self.editing = None;
            }
            Message::ProvinceSelected(province) => {
                self.cities = self.store.cities(&province).unwrap_or_else(|e| {
                    error!("Failed to load cities: {}", e);
                    Vec::new()
                });
                self.province = Some(province);
                self.city = None;
                self.clear_results();
            }
            Message::CitySelected(city) => {
                self.city = Some(city);
            }
            Message::Query => match (self.province.clone(), self.city.clone()) {
                (Some(province), Some(city)) => {
                    self.run_query(LastQuery::Region { province, city });
                }
                _ => self.status = "Pick a province and a city first.".to_string(),
            },
            Message::KeywordChanged(keyword) => {
                self.keyword = keyword;
            }
            Message::Search => {
                if self.keyword.trim().is_empty() {
                    self.clear_results();
                } else {
                    self.run_query(LastQuery::Keyword(self.keyword.clone()));
                }
            }
            Message::Toggle(id, checked) => {
                if checked {
                    self.selected.insert(id);
                } else {
                    self.selected.remove(&id);
                }
            }
            Message::DeleteSelected => self.delete_selected(),
            Message::EditSelected => self.edit_selected(),
            Message::CopySelected => {
                let lines: Vec<String> = self
                    .results
                    .iter()
                    .filter(|r| self.selected.contains(&r.id))
                    .map(AddressRecord::summary)
                    .collect();
                if lines.is_empty() {
                    self.status = "Select the addresses to copy first.".to_string();
                } else {
                    self.status = format!("Copied {} addresses.", lines.len());
                    return iced::clipboard::write(lines.join("\n"));
                }
            }
            Message::ShowDetails(id) => {
                self.details = self.results.iter().find(|r| r.id == id).cloned();
            }
            Message::CloseDetails => {
                self.details = None;
            }
            Message::CopyText(value) => {
                self.status = "Copied to clipboard.".to_string();
                return iced::clipboard::write(value);
            }
            Message::ClearResults => self.clear_results(),
        }

        Task::none()
    }

    fn submit(&mut self) {
        let outcome = match self.editing {
            Some(id) => self.store.update(id, &self.form).map(|_| id),
            None => self.store.create(&self.form),
        };

        match outcome {
            Ok(id) => {
                self.status = if self.editing.is_some() {
                    format!("Address {} updated.", id)
                } else {
                    format!("Address {} added.", id)
                };
                self.form = AddressFields::default();
                self.editing = None;
                self.reload_provinces();
                self.refresh_results();
            }
            Err(e) => {
                self.status = format!("Could not save the address: {}", e);
            }
        }
    }

    fn delete_selected(&mut self) {
        let ids: Vec<i64> = self.selected.iter().copied().collect();
        if ids.is_empty() {
            self.status = "Select the addresses to delete first.".to_string();
            return;
        }

        let question = format!("Delete the {} selected addresses?", ids.len());
        if !confirm("Confirm deletion", &question) {
            return;
        }

        match self.store.delete(&ids) {
            Ok(removed) => {
                self.status = format!("Deleted {} addresses.", removed);
                self.details = None;
                self.reload_provinces();
                self.refresh_results();
            }
            Err(e) => self.status = format!("Delete failed: {}", e),
        }
    }

    fn edit_selected(&mut self) {
        if self.selected.len() != 1 {
            self.status = "Select exactly one address to edit.".to_string();
            return;
        }
        let Some(&id) = self.selected.iter().next() else {
            return;
        };

        match self.store.get(id) {
            Ok(Some(record)) => {
                self.form = record.fields;
                self.editing = Some(id);
                self.status = format!("Editing address {}.", id);
            }
            Ok(None) => self.status = format!("Address {} no longer exists.", id),
            Err(e) => self.status = format!("Could not load address {}: {}", id, e),
        }
    }

    fn run_query(&mut self, query: LastQuery) {
        let found = match &query {
            LastQuery::Region { province, city } => self.store.find_by_region(province, city),
            LastQuery::Keyword(keyword) => self.store.search(keyword),
        };

        match found {
            Ok(records) => {
                info!("Query returned {} addresses", records.len());
                self.status = if records.is_empty() {
                    "No matching addresses.".to_string()
                } else {
                    format!("{} addresses found.", records.len())
                };
                self.results = records;
                self.selected.clear();
                self.last_query = Some(query);
            }
            Err(e) => self.status = format!("Query failed: {}", e),
        }
    }

    fn refresh_results(&mut self) {
        if let Some(query) = self.last_query.clone() {
            let status = self.status.clone();
            self.run_query(query);
            self.status = status;
        }
    }

    fn clear_results(&mut self) {
        self.results.clear();
        self.selected.clear();
        self.last_query = None;
        self.details = None;
    }

    fn reload_provinces(&mut self) {
        match self.store.provinces() {
            Ok(provinces) => self.provinces = provinces,
            Err(e) => error!("Failed to load provinces: {}", e),
        }
        if let Some(province) = &self.province {
            if !self.provinces.contains(province) {
                self.province = None;
                self.city = None;
                self.cities.clear();
            }
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let panels = row![self.form_view(), self.query_view()]
            .spacing(20)
            .width(Length::Fill);

        let mut content = column![panels, self.results_view()].spacing(16);
        if let Some(record) = &self.details {
            content = content.push(details_view(record));
        }
        content = content.push(text(&self.status).size(14));

        scrollable(content.padding(10)).into()
    }

    fn form_view(&self) -> Element<'_, Message> {
        let title = if self.editing.is_some() {
            "Edit address"
        } else {
            "New address"
        };

        let mut form = Column::new().spacing(6).push(text(title).size(20));
        for field in AddressField::ALL {
            let input = text_input(field.label(), self.form.get(field))
                .on_input(move |value| Message::FieldChanged(field, value))
                .width(Length::Fill);

            let line = if field == AddressField::PhotoPath {
                row![
                    text(field.label()).width(Length::Fixed(130.0)),
                    input,
                    button("Browse").on_press(Message::PickPhoto),
                ]
            } else {
                row![text(field.label()).width(Length::Fixed(130.0)), input]
            };
            form = form.push(line.spacing(8).align_y(Alignment::Center));
        }

        let submit_label = if self.editing.is_some() {
            "Update address"
        } else {
            "Add address"
        };
        form = form.push(
            row![
                button("Clear").on_press(Message::ClearForm),
                button(submit_label).on_press(Message::Submit),
            ]
            .spacing(8),
        );

        container(form).width(Length::FillPortion(1)).into()
    }

    fn query_view(&self) -> Element<'_, Message> {
        let region = column![
            text("Find addresses").size(20),
            pick_list(
                self.provinces.as_slice(),
                self.province.clone(),
                Message::ProvinceSelected
            )
            .placeholder("Province")
            .width(Length::Fill),
            pick_list(self.cities.as_slice(), self.city.clone(), Message::CitySelected)
                .placeholder("City")
                .width(Length::Fill),
            button("Query").on_press(Message::Query),
            text_input("Keyword", &self.keyword)
                .on_input(Message::KeywordChanged)
                .on_submit(Message::Search),
            button("Text search").on_press(Message::Search),
        ]
        .spacing(8);

        container(region).width(Length::FillPortion(1)).into()
    }

    fn results_view(&self) -> Element<'_, Message> {
        let list = if self.results.is_empty() {
            Column::new().push(text("No results"))
        } else {
            Column::with_children(self.results.iter().map(|record| {
                let id = record.id;
                row![
                    checkbox(record.summary(), self.selected.contains(&id))
                        .on_toggle(move |checked| Message::Toggle(id, checked))
                        .width(Length::Fill),
                    button("Details").on_press(Message::ShowDetails(id)),
                ]
                .spacing(8)
                .align_y(Alignment::Center)
                .into()
            }))
        };

        let actions = row![
            button("Delete selected").on_press(Message::DeleteSelected),
            button("Edit selected").on_press(Message::EditSelected),
            button("Copy selected").on_press(Message::CopySelected),
            button("Clear results").on_press(Message::ClearResults),
        ]
        .spacing(8);

        column![
            text("Results").size(20),
            scrollable(list.spacing(4)).height(Length::Fixed(240.0)),
            actions,
        ]
        .spacing(8)
        .into()
    }
}

/// All fields of one record, each with a copy button, plus the photo if it exists
fn details_view(record: &AddressRecord) -> Element<'_, Message> {
    let mut lines = Column::new().spacing(4).push(text("Address details").size(20));

    let photo = record.fields.photo_path.as_str();
    if !photo.is_empty() && Path::new(photo).exists() {
        lines = lines.push(
            iced::widget::image(iced::widget::image::Handle::from_path(photo))
                .width(Length::Fixed(300.0)),
        );
    }

    let f = &record.fields;
    let mut shown: Vec<(&str, &str)> = vec![
        ("Province", f.province.as_str()),
        ("City", f.city.as_str()),
        ("Street", f.street.as_str()),
        ("Full address", record.full_address.as_str()),
    ];
    for field in AddressField::ALL.into_iter().skip(3) {
        let value = f.get(field);
        if !value.is_empty() {
            shown.push((field.label(), value));
        }
    }

    for (label, value) in shown {
        lines = lines.push(
            row![
                text(format!("{}:", label)).width(Length::Fixed(130.0)),
                text(value).width(Length::Fill),
                button("Copy").on_press(Message::CopyText(value.to_string())),
            ]
            .spacing(8)
            .align_y(Alignment::Center),
        );
    }

    lines = lines.push(button("Close").on_press(Message::CloseDetails));
    container(lines).padding(10).into()
}
