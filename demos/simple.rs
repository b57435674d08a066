use dn_acl::*;

fn main() -> Result<(), Error> {
    env_logger::init();

    let mut resolver = Resolver::new("dc=gonicus,dc=de");

    // tester1 may read, write and run the factory anywhere below dc=a
    let mut rule = Rule::new(Scope::Sub);

    rule.add_member("tester1")?;
    rule.add_action("com.gosa.factory", "rwx", Options::new())?;
    resolver.add_acl_to_location("dc=a,dc=gonicus,dc=de", rule);

    // except below dc=b
    let mut reset = Rule::new(Scope::Reset);

    reset.add_member("tester1")?;
    reset.add_action("com.gosa.factory", "rwx", Options::new())?;
    resolver.add_acl_to_location("dc=b,dc=a,dc=gonicus,dc=de", reset);

    // administrators get everything in com, resets or not
    let mut admins = AclRole::new("admins");
    let mut all    = Rule::new(Scope::PermanentSub);

    all.add_action("com.*", "rwcdsx", Options::new())?;
    admins.add(all);
    resolver.add_acl_role(admins)?;

    let mut admin = Rule::with_role("admins");

    admin.add_member("admin.*")?;
    resolver.add_acl_to_location("dc=gonicus,dc=de", admin);

    let options = Options::new();

    for location in &["dc=a,dc=gonicus,dc=de", "dc=b,dc=a,dc=gonicus,dc=de", "dc=gonicus,dc=de"] {
        for user in &["tester1", "administrator"] {
            let allowed = resolver.check(user, "com.gosa.factory", "r", &options, location)?;

            println!("{:<14} read com.gosa.factory at {:<28} {}", user, location, allowed);
        } // for
    } // for

    let store = MemoryStore::new();

    resolver.save_to(&store)?;
    println!("{}", store.contents().unwrap_or_default());

    Ok(())
} // main
