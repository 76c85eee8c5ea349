use crate::cli::{
    Commands, ContactArgs, EditArgs, HistoryArgs, ListArgs, ProfileFields, SortKey, TaskArgs,
};
use anyhow::{bail, Context};
use log::info;
use rolodex_core::{
    export_to_path, import_from_path, Contact, ContactChange, ContactService, Entity,
    EntityCollection, HistoryFilter, TaskFilter,
};

pub fn handle(command: Commands, service: &mut ContactService) -> anyhow::Result<()> {
    match command {
        Commands::Add(args) => add(args, service),
        Commands::Edit(args) => edit(args, service),
        Commands::Remove { id } => {
            let change = service.remove_contact(id)?;
            report_change("removed", &change)
        }
        Commands::List(args) => {
            list(args, service);
            Ok(())
        }
        Commands::Tasks(args) => {
            tasks(args, service);
            Ok(())
        }
        Commands::History(args) => {
            history(args, service);
            Ok(())
        }
        Commands::Stats => {
            let stats = service.statistics();
            println!("contacts: {}", stats.contacts);
            println!("interactions: {}", stats.interactions);
            println!("tasks: {} ({} urgent)", stats.tasks, stats.urgent_tasks);
            Ok(())
        }
        Commands::Export { path } => {
            let records = export_to_path(service.gateway(), &path)
                .with_context(|| format!("export to {} failed", path.display()))?;
            println!("exported {records} records to {}", path.display());
            Ok(())
        }
        Commands::Import { path } => {
            let report = import_from_path(service.gateway_mut(), &path)
                .with_context(|| format!("import from {} failed", path.display()))?;
            for rejected in &report.rejected {
                eprintln!("skipped record #{}: {}", rejected.index, rejected.error);
            }
            for orphan in &report.orphans {
                eprintln!(
                    "skipped {} {}: owner {} is not in the file",
                    orphan.kind.object_type(),
                    orphan.id,
                    orphan.owner_id
                );
            }
            for failure in &report.failures {
                eprintln!(
                    "could not store {} {}: {}",
                    failure.kind.object_type(),
                    failure.id,
                    failure.error
                );
            }
            println!(
                "imported {} contacts, {} interactions, {} tasks",
                report.contacts, report.interactions, report.tasks
            );
            let reload = service.gateway_mut().load_all();
            info!(
                "event=cli_import module=cli status=ok reloaded_contacts={}",
                reload.contacts
            );
            Ok(())
        }
    }
}

fn add(args: ContactArgs, service: &mut ContactService) -> anyhow::Result<()> {
    let mut contact = Contact::new(args.first, args.last);
    apply_profile(&mut contact, args.profile);
    let change = service.add_contact(contact)?;
    report_change("added", &change)
}

fn edit(args: EditArgs, service: &mut ContactService) -> anyhow::Result<()> {
    let Some(current) = service.gateway().get::<Contact>(args.id) else {
        bail!("contact {} does not exist", args.id);
    };
    let mut contact = current.clone();
    if let Some(first) = args.first {
        contact.set_first_name(first);
    }
    if let Some(last) = args.last {
        contact.set_last_name(last);
    }
    apply_profile(&mut contact, args.profile);
    let change = service.edit_contact(&contact)?;
    report_change("updated", &change)
}

fn apply_profile(contact: &mut Contact, profile: ProfileFields) {
    if let Some(company) = profile.company {
        contact.set_company(company);
    }
    if let Some(email) = profile.email {
        contact.set_email(email);
    }
    if let Some(phone) = profile.phone {
        contact.set_phone(phone);
    }
    if let Some(note) = profile.note {
        contact.set_note(note);
    }
}

fn report_change(verb: &str, change: &ContactChange) -> anyhow::Result<()> {
    println!(
        "contact {} {verb} ({} tasks from note)",
        change.contact_id,
        change.task_ids.len()
    );
    if change.flush.is_clean() {
        return Ok(());
    }
    for failure in &change.flush.failures {
        eprintln!("not saved: {}: {}", failure.operation, failure.error);
    }
    bail!(
        "{} pending change(s) could not be saved",
        change.flush.failures.len()
    )
}

fn list(args: ListArgs, service: &ContactService) {
    let mut contacts: EntityCollection<Contact> = service.gateway().contacts().clone();
    if let Some(name) = args.name.as_deref() {
        contacts = contacts.search_by_name(name);
    }
    if let Some(company) = args.company.as_deref() {
        contacts = contacts.search_by_company(company);
    }
    match args.sort {
        SortKey::Name => contacts.sort_by_name(args.reverse),
        SortKey::Date => contacts.sort_by_date(args.reverse),
    }
    for contact in &contacts {
        println!(
            "{:>5}  {:<30}  {:<20}  {:<15}  {}",
            contact.id(),
            contact.full_name(),
            contact.company(),
            contact.phone(),
            contact.creation_date().to_compact_string()
        );
    }
}

fn tasks(args: TaskArgs, service: &ContactService) {
    let filter = TaskFilter {
        search: args.search,
        urgent_only: args.urgent,
        from: args.from,
        to: args.to,
    };
    for row in service.filter_tasks(&filter) {
        let due = if row.task.is_urgent() {
            "urgent".to_string()
        } else {
            row.task.date.to_compact_string()
        };
        println!(
            "{:>5}  {:<30}  {:<10}  {}",
            row.task.id, row.owner_name, due, row.task.description
        );
    }
}

fn history(args: HistoryArgs, service: &ContactService) {
    let filter = HistoryFilter {
        owner_id: args.contact,
        kind: args.kind.map(Into::into),
        from: args.from,
        to: args.to,
    };
    for interaction in service.history(&filter) {
        println!(
            "{:>5}  {}  {:?}  {}",
            interaction.id,
            interaction.date.to_compact_string(),
            interaction.kind,
            interaction.description
        );
    }
}
