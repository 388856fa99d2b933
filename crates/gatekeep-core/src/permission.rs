//! The closed set of capabilities a role can grant.
//!
//! Each permission has a stable dotted wire name (`<module>.<action>`) used
//! in storage and in the JSON API. Names are validated when parsed; there is
//! no way to construct a permission that is not listed here.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::Error;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Display,
  EnumIter,
  EnumString,
  IntoStaticStr,
  Serialize,
  Deserialize,
)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Permission {
  // ── Dashboard ───────────────────────────────────────────────────────────
  #[strum(serialize = "dashboard.ver_dashboard")]
  ViewDashboard,

  // ── Visitors ────────────────────────────────────────────────────────────
  #[strum(serialize = "visitantes.ver_visitantes")]
  ViewVisitors,
  #[strum(serialize = "visitantes.crear_visitantes")]
  CreateVisitors,
  #[strum(serialize = "visitantes.editar_visitantes")]
  EditVisitors,
  #[strum(serialize = "visitantes.eliminar_visitantes")]
  DeleteVisitors,
  #[strum(serialize = "visitantes.cambiar_estado_visitantes")]
  ChangeVisitorState,
  #[strum(serialize = "visitantes.generar_credenciales")]
  IssueCredentials,

  // ── Access control ──────────────────────────────────────────────────────
  #[strum(serialize = "acceso.control_acceso")]
  ControlAccess,
  #[strum(serialize = "acceso.ver_registro_accesos")]
  ViewAccessLog,

  // ── Users ───────────────────────────────────────────────────────────────
  #[strum(serialize = "usuarios.ver_usuarios")]
  ViewUsers,
  #[strum(serialize = "usuarios.crear_usuarios")]
  CreateUsers,
  #[strum(serialize = "usuarios.editar_usuarios")]
  EditUsers,
  #[strum(serialize = "usuarios.eliminar_usuarios")]
  DeleteUsers,
  #[strum(serialize = "usuarios.cambiar_estado_usuarios")]
  ChangeUserState,
  #[strum(serialize = "usuarios.asignar_roles")]
  AssignRoles,

  // ── Alerts ──────────────────────────────────────────────────────────────
  #[strum(serialize = "alertas.ver_alertas")]
  ViewAlerts,
  #[strum(serialize = "alertas.crear_alertas")]
  CreateAlerts,
  #[strum(serialize = "alertas.editar_alertas")]
  EditAlerts,
  #[strum(serialize = "alertas.eliminar_alertas")]
  DeleteAlerts,

  // ── Reports ─────────────────────────────────────────────────────────────
  #[strum(serialize = "reportes.ver_reportes")]
  ViewReports,
  #[strum(serialize = "reportes.generar_reportes")]
  GenerateReports,
  #[strum(serialize = "reportes.exportar_reportes")]
  ExportReports,

  // ── Configuration ───────────────────────────────────────────────────────
  #[strum(serialize = "configuracion.gestionar_roles")]
  ManageRoles,
  #[strum(serialize = "configuracion.gestionar_permisos")]
  ManagePermissions,
  #[strum(serialize = "configuracion.configurar_sistema")]
  ConfigureSystem,
}

impl Permission {
  /// The dotted wire name, e.g. `"acceso.control_acceso"`.
  pub fn name(self) -> &'static str { self.into() }

  /// The module prefix of the wire name, e.g. `"acceso"`.
  pub fn module(self) -> &'static str {
    let name = self.name();
    name.split_once('.').map_or(name, |(module, _)| module)
  }

  pub fn all() -> BTreeSet<Self> { Self::iter().collect() }
}

impl TryFrom<String> for Permission {
  type Error = Error;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse().map_err(|_| Error::UnknownPermission(value))
  }
}

/// Parse a list of wire names, failing on the first unknown one.
pub fn parse_permissions<I, T>(names: I) -> crate::Result<BTreeSet<Permission>>
where
  I: IntoIterator<Item = T>,
  T: Into<String>,
{
  names
    .into_iter()
    .map(|n| Permission::try_from(n.into()))
    .collect()
}
