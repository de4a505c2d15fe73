use log::{debug, trace, warn};
use sqlx::SqliteConnection;

use crate::{
    db_types::Vs,
    traits::{PaymentGatewayError, VsPolicy},
};

/// Reserves `vs` with a single insert. The primary key on the registry turns a second reservation of the same token
/// into [`PaymentGatewayError::VsAlreadyTaken`].
pub async fn reserve_exact(vs: &Vs, conn: &mut SqliteConnection) -> Result<(), PaymentGatewayError> {
    match sqlx::query("INSERT INTO vs_registry (vs) VALUES ($1)").bind(vs).execute(conn).await {
        Ok(_) => {
            trace!("🗃️ Variable symbol {vs} reserved");
            Ok(())
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(PaymentGatewayError::VsAlreadyTaken(vs.clone())),
        Err(e) => Err(e.into()),
    }
}

/// Generates random tokens until one can be reserved. Collisions are expected when several orders are created at
/// once, and simply cost another attempt.
pub async fn reserve_new(policy: VsPolicy, conn: &mut SqliteConnection) -> Result<Vs, PaymentGatewayError> {
    for attempt in 1..=policy.max_attempts {
        let candidate = Vs::random(&mut rand::thread_rng(), policy.digits);
        match reserve_exact(&candidate, &mut *conn).await {
            Ok(()) => return Ok(candidate),
            Err(PaymentGatewayError::VsAlreadyTaken(_)) => {
                debug!("🗃️ Variable symbol {candidate} is taken. Attempt {attempt}/{}", policy.max_attempts);
            },
            Err(e) => return Err(e),
        }
    }
    warn!("🗃️ No free variable symbol found after {} attempts", policy.max_attempts);
    Err(PaymentGatewayError::VsExhausted(policy.max_attempts))
}

pub async fn is_reserved(vs: &Vs, conn: &mut SqliteConnection) -> Result<bool, PaymentGatewayError> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM vs_registry WHERE vs = $1)")
        .bind(vs)
        .fetch_one(conn)
        .await?;
    Ok(exists)
}
